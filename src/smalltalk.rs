//! Canned replies for casual messages that are not worth a web search.

use rand::Rng;
use serde_json::{Map, Value};
use std::path::Path;

pub const DEFAULT_DATA_FILE: &str = "smalltalk_data.json";

#[derive(Debug, thiserror::Error)]
pub enum SmalltalkError {
    #[error("failed to read small-talk data from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("small-talk data is not a JSON object: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("replies for trigger {0:?} must be a non-empty list of strings")]
    InvalidReplies(String),
}

/// Chooses which of several candidate replies to send.
pub trait ReplyPicker: Send + Sync {
    /// Returns an index in `0..len`. `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Uniform choice from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPicker;

impl ReplyPicker for RandomPicker {
    fn pick(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Trigger phrase -> candidate replies, kept in the order of the source file.
#[derive(Debug, Clone, Default)]
pub struct SmalltalkTable {
    entries: Vec<(String, Vec<String>)>,
}

impl SmalltalkTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SmalltalkError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SmalltalkError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SmalltalkError> {
        let object: Map<String, Value> = serde_json::from_str(raw)?;
        let mut entries = Vec::with_capacity(object.len());

        for (trigger, value) in object {
            let replies = match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect::<Option<Vec<String>>>(),
                _ => None,
            };
            match replies {
                Some(replies) if !replies.is_empty() => {
                    entries.push((trigger.to_lowercase(), replies));
                }
                _ => return Err(SmalltalkError::InvalidReplies(trigger)),
            }
        }

        Ok(Self { entries })
    }

    pub fn from_entries<I, T, R>(entries: I) -> Self
    where
        I: IntoIterator<Item = (T, Vec<R>)>,
        T: Into<String>,
        R: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(trigger, replies)| {
                    (
                        trigger.into().to_lowercase(),
                        replies.into_iter().map(Into::into).collect::<Vec<String>>(),
                    )
                })
                .filter(|(_, replies)| !replies.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn replies_for(&self, trigger: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(t, _)| t == trigger)
            .map(|(_, replies)| replies.as_slice())
    }

    /// First trigger, in table order, contained in `text`. `text` must already be lowercase.
    fn first_match(&self, text: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(trigger, _)| text.contains(trigger.as_str()))
            .map(|(_, replies)| replies.as_slice())
    }
}

pub struct SmalltalkMatcher {
    table: SmalltalkTable,
    picker: Box<dyn ReplyPicker>,
}

impl SmalltalkMatcher {
    pub fn new(table: SmalltalkTable, picker: Box<dyn ReplyPicker>) -> Self {
        Self { table, picker }
    }

    /// A canned reply when `text` contains a trigger phrase.
    ///
    /// The first trigger in table order wins, even if a later one is longer or more specific.
    pub fn detect(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        let replies = self.table.first_match(&lowered)?;
        let idx = self.picker.pick(replies.len()).min(replies.len() - 1);
        Some(replies[idx].as_str())
    }
}
