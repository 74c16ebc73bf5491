use async_trait::async_trait;
use std::io::Write;

use crate::data_models::ReplyFormat;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat API error {code:?}: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },
    #[error("failed to write reply: {0}")]
    Io(#[from] std::io::Error),
}

/// What the dialogue needs from a chat service.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Shows the "typing..." indicator in the chat.
    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError>;

    async fn send_reply(
        &self,
        chat_id: i64,
        text: &str,
        format: ReplyFormat,
    ) -> Result<(), TransportError>;
}

/// Prints replies to stdout. Used by the `ask` command.
#[derive(Debug, Default)]
pub struct ConsoleTransport;

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send_typing(&self, _chat_id: i64) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_reply(
        &self,
        _chat_id: i64,
        text: &str,
        _format: ReplyFormat,
    ) -> Result<(), TransportError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{text}")?;
        stdout.flush()?;
        Ok(())
    }
}
