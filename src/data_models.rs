use serde::{Deserialize, Serialize};

/// One hit returned by the search API, reduced to what the answer needs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        snippet: impl Into<String>,
        url: impl Into<String>,
    ) -> SearchResult {
        SearchResult {
            title: title.into(),
            snippet: snippet.into(),
            url: url.into(),
        }
    }
}

/// A text message as handed over by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
}

impl InboundMessage {
    pub fn new(chat_id: i64, user_id: i64, text: impl Into<String>) -> InboundMessage {
        InboundMessage {
            chat_id,
            user_id,
            text: text.into(),
        }
    }
}

/// Markup the transport should apply when rendering a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    Plain,
    /// Telegram's legacy `Markdown` parse mode.
    Markdown,
}
