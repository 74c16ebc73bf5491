//! Telegram Bot API transport: a thin JSON client plus the long-polling update loop.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::data_models::ReplyFormat;
use crate::transport::{ChatTransport, TransportError};

pub mod models;
pub mod poller;

use models::{ApiResponse, GetUpdates, Message, SendChatAction, SendMessage, Update};

/// Seconds Telegram may hold a `getUpdates` call open.
pub const POLL_TIMEOUT_SECS: u64 = 30;

pub struct TelegramClient {
    http: reqwest::Client,
    /// `<api>/bot<token>`; never log this.
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TransportError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response: ApiResponse<R> = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(params)
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let params = GetUpdates {
            offset,
            timeout,
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &params).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        format: ReplyFormat,
    ) -> Result<Message, TransportError> {
        let params = SendMessage {
            chat_id,
            text,
            parse_mode: match format {
                ReplyFormat::Plain => None,
                ReplyFormat::Markdown => Some("Markdown"),
            },
            disable_web_page_preview: false,
        };
        self.call("sendMessage", &params).await
    }

    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<bool, TransportError> {
        self.call("sendChatAction", &SendChatAction { chat_id, action })
            .await
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError> {
        self.send_chat_action(chat_id, "typing").await.map(|_| ())
    }

    async fn send_reply(
        &self,
        chat_id: i64,
        text: &str,
        format: ReplyFormat,
    ) -> Result<(), TransportError> {
        self.send_message(chat_id, text, format).await.map(|_| ())
    }
}
