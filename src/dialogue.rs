//! Per-message conversation flow: clean the question, answer small talk directly,
//! otherwise search and reply with the formatted results.

use nanoid::nanoid;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::analyzer::QueryNormalizer;
use crate::data_models::{InboundMessage, ReplyFormat};
use crate::formatter::format_answer;
use crate::logging::ConversationLog;
use crate::search::{SearchError, SearchProvider};
use crate::smalltalk::SmalltalkMatcher;
use crate::transport::{ChatTransport, TransportError};

pub const GREETING: &str = "Здравствуй! Задай мне вопрос о женской физиологии,\n\
и я пришлю краткий ответ со ссылками на источники.";
pub const HELP: &str = "Просто напиши вопрос, например: 'что такое овуляция?'";
pub const EMPTY_QUERY_PROMPT: &str = "Пожалуйста, отправьте текстовый запрос.";
pub const SEARCH_FAILURE: &str = "Произошла ошибка при поиске. Попробуйте позже.";

pub const DEFAULT_RESULT_LIMIT: usize = 4;

/// How a message was dealt with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Blank input, the user was asked for a text query.
    Prompted,
    SmallTalk,
    Answered,
    /// The search failed and the user got the generic failure reply.
    Failed,
}

pub struct Dialogue {
    normalizer: QueryNormalizer,
    smalltalk: SmalltalkMatcher,
    search: Arc<dyn SearchProvider>,
    log: ConversationLog,
    result_limit: usize,
}

impl Dialogue {
    pub fn new(
        normalizer: QueryNormalizer,
        smalltalk: SmalltalkMatcher,
        search: Arc<dyn SearchProvider>,
        log: ConversationLog,
    ) -> Self {
        Self {
            normalizer,
            smalltalk,
            search,
            log,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }

    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    /// Handles one inbound message. Always tries to reply; errors stop here.
    pub async fn handle(&self, message: &InboundMessage, transport: &dyn ChatTransport) -> Outcome {
        let raw_text = message.text.trim();
        let query = self.normalizer.normalize(raw_text);
        self.log.request(message.user_id, raw_text, &query);

        if raw_text.is_empty() {
            self.respond(transport, message, EMPTY_QUERY_PROMPT, ReplyFormat::Plain)
                .await;
            return Outcome::Prompted;
        }

        if let Some(reply) = self.smalltalk.detect(&query) {
            self.respond(transport, message, reply, ReplyFormat::Plain)
                .await;
            return Outcome::SmallTalk;
        }

        if let Err(e) = transport.send_typing(message.chat_id).await {
            tracing::debug!(error = %e, "typing indicator not delivered");
        }

        match self.answer(&query).await {
            Ok(answer) => {
                match self
                    .deliver(transport, message, &answer, ReplyFormat::Markdown)
                    .await
                {
                    Ok(()) => return Outcome::Answered,
                    Err(e) => self.log.delivery_failure(&e),
                }
            }
            Err(e) => self.log.search_failure(&e),
        }

        self.respond(transport, message, SEARCH_FAILURE, ReplyFormat::Plain)
            .await;
        Outcome::Failed
    }

    /// Replies to a bot command with fixed text.
    pub async fn answer_command(
        &self,
        transport: &dyn ChatTransport,
        message: &InboundMessage,
        text: &str,
    ) {
        let command = message.text.trim();
        self.log.request(message.user_id, command, command);
        self.respond(transport, message, text, ReplyFormat::Plain)
            .await;
    }

    /// Searches for `query` and renders the reply text.
    pub async fn answer(&self, query: &str) -> Result<String, SearchError> {
        let results = self.search.search(query, self.result_limit).await?;
        Ok(format_answer(&results))
    }

    /// Sends `text` and records it once it was accepted.
    pub async fn deliver(
        &self,
        transport: &dyn ChatTransport,
        message: &InboundMessage,
        text: &str,
        format: ReplyFormat,
    ) -> Result<(), TransportError> {
        transport.send_reply(message.chat_id, text, format).await?;
        self.log.response(message.user_id, text);
        Ok(())
    }

    /// Like [`Dialogue::deliver`], but a reply that cannot be delivered is only logged.
    pub async fn respond(
        &self,
        transport: &dyn ChatTransport,
        message: &InboundMessage,
        text: &str,
        format: ReplyFormat,
    ) {
        if let Err(e) = self.deliver(transport, message, text, format).await {
            tracing::warn!(chat_id = message.chat_id, error = %e, "failed to deliver reply");
        }
    }

    /// Runs [`Dialogue::handle`] on its own task. A panic inside the handler is recorded as a
    /// fault and still answered with the generic failure reply.
    pub fn dispatch(
        self: &Arc<Self>,
        message: InboundMessage,
        transport: Arc<dyn ChatTransport>,
    ) -> JoinHandle<Outcome> {
        let id = nanoid!(10);
        let span = tracing::info_span!("message", id = %id, chat = message.chat_id);
        let dialogue = Arc::clone(self);

        let worker = {
            let dialogue = Arc::clone(&dialogue);
            let transport = Arc::clone(&transport);
            let message = message.clone();
            tokio::spawn(
                async move { dialogue.handle(&message, transport.as_ref()).await }
                    .instrument(span.clone()),
            )
        };

        tokio::spawn(
            async move {
                match worker.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        dialogue.log.fault(&e);
                        dialogue
                            .respond(transport.as_ref(), &message, SEARCH_FAILURE, ReplyFormat::Plain)
                            .await;
                        Outcome::Failed
                    }
                }
            }
            .instrument(span),
        )
    }
}
