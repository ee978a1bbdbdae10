//! Configuration for Courier gateway
//!
//! Built once in `main` from CLI flags and environment variables, then
//! passed by reference into the components that need it.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Default Gemini model for chat completions
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default history database path
pub const DEFAULT_DB_PATH: &str = "users_history.db";

/// Default number of recent turns sent as context
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Courier gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub telegram_token: String,

    /// Gemini API key
    pub gemini_api_key: String,

    /// Gemini model identifier for chat completions
    pub model: String,

    /// Path to the history database
    pub db_path: PathBuf,

    /// Number of most-recent turns included in each context window
    pub history_limit: usize,

    /// Interval between Telegram getUpdates polls
    pub poll_interval: Duration,
}

impl Config {
    /// Validate required fields
    ///
    /// # Errors
    ///
    /// Returns error if a required credential is empty
    pub fn validate(&self) -> Result<()> {
        if self.telegram_token.is_empty() {
            return Err(Error::Config("TELEGRAM_TOKEN is required".to_string()));
        }
        if self.gemini_api_key.is_empty() {
            return Err(Error::Config("GEMINI_API_KEY is required".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            telegram_token: "tok".to_string(),
            gemini_api_key: "key".to_string(),
            model: DEFAULT_MODEL.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            history_limit: DEFAULT_HISTORY_LIMIT,
            poll_interval: Duration::from_secs(2),
        }
    }

    #[test]
    fn validates_complete_config() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_missing_telegram_token() {
        let config = Config {
            telegram_token: String::new(),
            ..sample()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_missing_gemini_key() {
        let config = Config {
            gemini_api_key: String::new(),
            ..sample()
        };
        assert!(config.validate().is_err());
    }
}
