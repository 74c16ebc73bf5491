use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::logging::LogSettings;
use crate::smalltalk::DEFAULT_DATA_FILE;

pub const DEFAULT_GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct Config {
    pub telegram_token: Option<String>,
    pub telegram_api_url: String,
    pub google_api_key: String,
    pub google_cse_id: String,
    pub google_search_url: String,
    pub search_result_limit: usize,
    pub search_timeout: Duration,
    pub smalltalk_data: PathBuf,
    pub log: LogSettings,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let defaults = LogSettings::default();

        Ok(Config {
            telegram_token: vars.optional("TELEGRAM_TOKEN"),
            telegram_api_url: vars.or_default("TELEGRAM_API_URL", DEFAULT_TELEGRAM_API_URL),
            google_api_key: vars.required("GOOGLE_API_KEY")?,
            google_cse_id: vars.required("GOOGLE_CSE_ID")?,
            google_search_url: vars.or_default("GOOGLE_SEARCH_URL", DEFAULT_GOOGLE_SEARCH_URL),
            search_result_limit: vars.parsed("SEARCH_RESULT_LIMIT", 4)?,
            search_timeout: Duration::from_secs(vars.parsed("SEARCH_TIMEOUT_SECS", 15)?),
            smalltalk_data: PathBuf::from(vars.or_default("SMALLTALK_DATA", DEFAULT_DATA_FILE)),
            log: LogSettings {
                dir: vars
                    .optional("LOG_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.dir),
                max_bytes: vars.parsed("LOG_MAX_BYTES", defaults.max_bytes)?,
                backups: vars.parsed("LOG_BACKUPS", defaults.backups)?,
                console: vars.parsed("LOG_CONSOLE", defaults.console)?,
            },
        })
    }

    /// The bot token is only needed when talking to Telegram.
    pub fn telegram_token(&self) -> Result<&str, ConfigError> {
        self.telegram_token
            .as_deref()
            .ok_or(ConfigError::Missing("TELEGRAM_TOKEN"))
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_token", &self.telegram_token.as_ref().map(|_| "***"))
            .field("telegram_api_url", &self.telegram_api_url)
            .field("google_api_key", &"***")
            .field("google_cse_id", &self.google_cse_id)
            .field("google_search_url", &self.google_search_url)
            .field("search_result_limit", &self.search_result_limit)
            .field("search_timeout", &self.search_timeout)
            .field("smalltalk_data", &self.smalltalk_data)
            .field("log", &self.log)
            .finish()
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
        }
    }
}
