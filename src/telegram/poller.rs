use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::models::Update;
use super::{POLL_TIMEOUT_SECS, TelegramClient};
use crate::data_models::InboundMessage;
use crate::dialogue::{Dialogue, GREETING, HELP};
use crate::transport::ChatTransport;

/// Pause after a failed `getUpdates` call before polling again.
pub const RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Other,
}

/// Recognizes a leading `/command`, with or without the `@botname` suffix.
pub fn parse_command(text: &str) -> Option<Command> {
    let word = text.trim_start().split_whitespace().next()?;
    let name = word.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    Some(match name.to_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        _ => Command::Other,
    })
}

/// Long-polls Telegram and hands every text message to the dialogue.
pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    dialogue: Arc<Dialogue>,
    poll_timeout: u64,
    retry_delay: Duration,
}

impl UpdatePoller {
    pub fn new(client: Arc<TelegramClient>, dialogue: Arc<Dialogue>) -> Self {
        Self {
            client,
            dialogue,
            poll_timeout: POLL_TIMEOUT_SECS,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout = secs;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Polls until `cancel` fires. Messages are processed concurrently; the loop never waits
    /// for a reply to be sent before fetching the next batch.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut offset: Option<i64> = None;
        tracing::info!("Bot is polling for updates");

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = self.client.get_updates(offset, self.poll_timeout) => batch,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.route(update).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        tracing::info!("Bot stopped polling");
    }

    async fn route(&self, update: Update) {
        let Some(message) = update.message.as_ref().and_then(|m| m.to_inbound()) else {
            tracing::debug!(update_id = update.update_id, "skipping non-text update");
            return;
        };

        match parse_command(&message.text) {
            Some(Command::Start) => self.reply(&message, GREETING).await,
            Some(Command::Help) => self.reply(&message, HELP).await,
            Some(Command::Other) => {
                tracing::debug!(chat = message.chat_id, "ignoring unknown command");
            }
            None => {
                let transport: Arc<dyn ChatTransport> = self.client.clone();
                // The handle is dropped; the task keeps running and reports its own faults.
                let _ = self.dialogue.dispatch(message, transport);
            }
        }
    }

    async fn reply(&self, message: &InboundMessage, text: &str) {
        self.dialogue
            .answer_command(self.client.as_ref(), message, text)
            .await;
    }
}
