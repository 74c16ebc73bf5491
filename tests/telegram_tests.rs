use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use sourcebot::analyzer::QueryNormalizer;
use sourcebot::data_models::{ReplyFormat, SearchResult};
use sourcebot::dialogue::{Dialogue, GREETING};
use sourcebot::logging::ConversationLog;
use sourcebot::search::{SearchError, SearchProvider};
use sourcebot::smalltalk::{RandomPicker, SmalltalkMatcher, SmalltalkTable};
use sourcebot::telegram::TelegramClient;
use sourcebot::telegram::poller::UpdatePoller;
use sourcebot::transport::{ChatTransport, TransportError};

mod test_helpers {
    use super::*;

    pub const TOKEN: &str = "TEST";

    pub enum Poll {
        Batch(Value),
        Fail,
    }

    #[derive(Default)]
    pub struct BotState {
        pub script: Mutex<VecDeque<Poll>>,
        pub polls: Mutex<Vec<Value>>,
        pub sent: Mutex<Vec<Value>>,
        pub actions: Mutex<Vec<Value>>,
        pub reject_messages: bool,
    }

    impl BotState {
        pub fn sent(&self) -> Vec<Value> {
            self.sent.lock().unwrap().clone()
        }

        pub fn polls(&self) -> Vec<Value> {
            self.polls.lock().unwrap().clone()
        }
    }

    async fn get_updates(State(state): State<Arc<BotState>>, Json(body): Json<Value>) -> Response {
        state.polls.lock().unwrap().push(body);
        let next = state.script.lock().unwrap().pop_front();
        match next {
            Some(Poll::Batch(updates)) => Json(json!({"ok": true, "result": updates})).into_response(),
            Some(Poll::Fail) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({"ok": false, "error_code": 502, "description": "Bad Gateway"})),
            )
                .into_response(),
            None => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Json(json!({"ok": true, "result": []})).into_response()
            }
        }
    }

    async fn send_message(State(state): State<Arc<BotState>>, Json(body): Json<Value>) -> Response {
        if state.reject_messages {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: can't parse entities"
                })),
            )
                .into_response();
        }
        let chat_id = body["chat_id"].clone();
        state.sent.lock().unwrap().push(body);
        Json(json!({
            "ok": true,
            "result": {"message_id": 77, "chat": {"id": chat_id}, "date": 0}
        }))
        .into_response()
    }

    async fn send_chat_action(
        State(state): State<Arc<BotState>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        state.actions.lock().unwrap().push(body);
        Json(json!({"ok": true, "result": true}))
    }

    /// Starts a fake Bot API and returns its base URL.
    pub async fn bot_api(state: Arc<BotState>) -> String {
        let router = Router::new()
            .route(&format!("/bot{TOKEN}/getUpdates"), post(get_updates))
            .route(&format!("/bot{TOKEN}/sendMessage"), post(send_message))
            .route(&format!("/bot{TOKEN}/sendChatAction"), post(send_chat_action))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> Value {
        json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "from": {"id": chat_id, "is_bot": false, "first_name": "Test"},
                "chat": {"id": chat_id, "type": "private"},
                "date": 1700000000,
                "text": text
            }
        })
    }

    pub struct StaticSearch;

    #[async_trait]
    impl SearchProvider for StaticSearch {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            Ok(vec![SearchResult::new(
                "Овуляция",
                "Овуляция это выход яйцеклетки из фолликула.",
                "https://example.org/ovulation",
            )])
        }
    }

    pub fn dialogue() -> Arc<Dialogue> {
        let smalltalk = SmalltalkMatcher::new(SmalltalkTable::default(), Box::new(RandomPicker));
        Arc::new(Dialogue::new(
            QueryNormalizer::default(),
            smalltalk,
            Arc::new(StaticSearch),
            ConversationLog::new(),
        ))
    }

    pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
        for _ in 0..250 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {what}");
    }
}

use test_helpers::*;

#[tokio::test]
async fn test_send_reply_sets_parse_mode() {
    let state = Arc::new(BotState::default());
    let base = bot_api(state.clone()).await;
    let client = TelegramClient::new(&base, TOKEN).unwrap();

    client
        .send_reply(42, "*Источники:*", ReplyFormat::Markdown)
        .await
        .unwrap();
    client.send_reply(42, "Привет!", ReplyFormat::Plain).await.unwrap();

    let sent = state.sent();
    assert_eq!(sent[0]["chat_id"], 42);
    assert_eq!(sent[0]["text"], "*Источники:*");
    assert_eq!(sent[0]["parse_mode"], "Markdown");
    assert_eq!(sent[0]["disable_web_page_preview"], false);
    assert!(sent[1].get("parse_mode").is_none());
}

#[tokio::test]
async fn test_send_typing() {
    let state = Arc::new(BotState::default());
    let base = bot_api(state.clone()).await;
    let client = TelegramClient::new(&base, TOKEN).unwrap();

    client.send_typing(9).await.unwrap();

    let actions = state.actions.lock().unwrap().clone();
    assert_eq!(actions, vec![json!({"chat_id": 9, "action": "typing"})]);
}

#[tokio::test]
async fn test_error_envelope_is_api_error() {
    let state = Arc::new(BotState {
        reject_messages: true,
        ..Default::default()
    });
    let base = bot_api(state).await;
    let client = TelegramClient::new(&base, TOKEN).unwrap();

    let err = client
        .send_reply(1, "[broken", ReplyFormat::Markdown)
        .await
        .unwrap_err();
    match err {
        TransportError::Api { code, description } => {
            assert_eq!(code, Some(400));
            assert!(description.contains("can't parse entities"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_updates() {
    let state = Arc::new(BotState::default());
    state
        .script
        .lock()
        .unwrap()
        .push_back(Poll::Batch(json!([text_update(5, 1, "привет")])));
    let base = bot_api(state.clone()).await;
    let client = TelegramClient::new(&base, TOKEN).unwrap();

    let updates = client.get_updates(Some(5), 0).await.unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].update_id, 5);
    assert_eq!(
        updates[0].message.as_ref().unwrap().text.as_deref(),
        Some("привет")
    );
    let polls = state.polls();
    assert_eq!(polls[0]["offset"], 5);
    assert_eq!(polls[0]["timeout"], 0);
    assert_eq!(polls[0]["allowed_updates"], json!(["message"]));
}

#[tokio::test]
async fn test_poller_routes_commands_and_questions() {
    let state = Arc::new(BotState::default());
    state.script.lock().unwrap().push_back(Poll::Batch(json!([
        text_update(100, 5, "/start"),
        text_update(101, 5, "ну расскажи про овуляцию"),
        text_update(102, 5, "/settings"),
        {"update_id": 103, "message": {"message_id": 9, "chat": {"id": 5}, "date": 0}},
    ])));
    let base = bot_api(state.clone()).await;
    let client = Arc::new(TelegramClient::new(&base, TOKEN).unwrap());
    let poller = UpdatePoller::new(client, dialogue()).with_poll_timeout(0);

    let cancel = CancellationToken::new();
    let running = tokio::spawn({
        let cancel = cancel.clone();
        async move { poller.run(cancel).await }
    });

    wait_until("two replies", || state.sent().len() >= 2).await;
    wait_until("a follow-up poll", || state.polls().len() >= 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();

    let sent = state.sent();
    assert_eq!(sent.len(), 2, "{sent:?}");
    assert_eq!(sent[0]["text"], GREETING);
    assert!(sent[0].get("parse_mode").is_none());
    assert_eq!(sent[1]["parse_mode"], "Markdown");
    assert!(
        sent[1]["text"]
            .as_str()
            .unwrap()
            .contains("1. [Овуляция](https://example.org/ovulation)")
    );

    let polls = state.polls();
    assert!(polls[0].get("offset").is_none());
    assert_eq!(polls[1]["offset"], 104);
}

#[tokio::test]
async fn test_poller_recovers_from_failed_poll() {
    let state = Arc::new(BotState::default());
    {
        let mut script = state.script.lock().unwrap();
        script.push_back(Poll::Fail);
        script.push_back(Poll::Batch(json!([text_update(7, 3, "/help")])));
    }
    let base = bot_api(state.clone()).await;
    let client = Arc::new(TelegramClient::new(&base, TOKEN).unwrap());
    let poller = UpdatePoller::new(client, dialogue())
        .with_poll_timeout(0)
        .with_retry_delay(Duration::from_millis(10));

    let cancel = CancellationToken::new();
    let running = tokio::spawn({
        let cancel = cancel.clone();
        async move { poller.run(cancel).await }
    });

    wait_until("help reply", || !state.sent().is_empty()).await;
    cancel.cancel();
    running.await.unwrap();

    assert!(state.polls().len() >= 2);
    assert!(
        state.sent()[0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Просто напиши вопрос")
    );
}
