//! Application configuration.
//!
//! Settings come from the environment (and a `.env` file when present) and are
//! gathered into one struct that is handed to the rest of the application.

use crate::gemini_adapter;
use std::path::PathBuf;
use tracing::Level;
use tutor_core::consts::{DEFAULT_VOICE, MAX_RECONNECT_ATTEMPTS};
use tutor_core::session_state::TranscriptMode;

pub const DEFAULT_LIVE_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    /// Model used for the live voice session.
    pub live_model: String,
    /// Model used for briefs and feedback.
    pub text_model: String,
    pub voice: String,
    pub max_reconnect_attempts: u32,
    pub transcript_mode: TranscriptMode,
    pub prompts_dir: PathBuf,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid number for {var}: {value}")]
    InvalidNumber { var: String, value: String },
    #[error("Invalid TRANSCRIPT_MODE, expected cumulative or delta: {0}")]
    InvalidTranscriptMode(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `GEMINI_API_KEY`: Required.
    /// *   `LIVE_MODEL`, `TEXT_MODEL`: (Optional) Model names.
    /// *   `TUTOR_VOICE`: (Optional) Prebuilt voice name. Defaults to "Zephyr".
    /// *   `MAX_RECONNECT_ATTEMPTS`: (Optional) Defaults to 3.
    /// *   `TRANSCRIPT_MODE`: (Optional) "cumulative" or "delta". Defaults to what the
    ///     Gemini Live transport sends, which is "delta".
    /// *   `PROMPTS_DIR`: (Optional) Directory holding `persona.md`. Defaults to "prompts".
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Useful for local development; ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let live_model = lookup("LIVE_MODEL").unwrap_or_else(|| DEFAULT_LIVE_MODEL.to_string());
        let text_model = lookup("TEXT_MODEL").unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string());
        let voice = lookup("TUTOR_VOICE").unwrap_or_else(|| DEFAULT_VOICE.to_string());

        let max_reconnect_attempts = match lookup("MAX_RECONNECT_ATTEMPTS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "MAX_RECONNECT_ATTEMPTS".to_string(),
                    value,
                })?,
            None => MAX_RECONNECT_ATTEMPTS,
        };

        let transcript_mode = match lookup("TRANSCRIPT_MODE") {
            Some(value) => value
                .parse::<TranscriptMode>()
                .map_err(|_| ConfigError::InvalidTranscriptMode(value))?,
            None => gemini_adapter::TRANSCRIPT_MODE,
        };

        let prompts_dir = PathBuf::from(
            lookup("PROMPTS_DIR").unwrap_or_else(|| DEFAULT_PROMPTS_DIR.to_string()),
        );

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            gemini_api_key,
            live_model,
            text_model,
            voice,
            max_reconnect_attempts,
            transcript_mode,
            prompts_dir,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("GEMINI_API_KEY", "abc")]).unwrap();
        assert_eq!(config.live_model, DEFAULT_LIVE_MODEL);
        assert_eq!(config.text_model, "gemini-2.5-flash");
        assert_eq!(config.voice, "Zephyr");
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.transcript_mode, TranscriptMode::Delta);
        assert_eq!(config.prompts_dir, PathBuf::from("prompts"));
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn api_key_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(_))));
        assert!(matches!(
            load(&[("GEMINI_API_KEY", "  ")]),
            Err(ConfigError::MissingVar(_))
        ));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("GEMINI_API_KEY", "abc"),
            ("TUTOR_VOICE", "Kore"),
            ("MAX_RECONNECT_ATTEMPTS", "5"),
            ("TRANSCRIPT_MODE", "cumulative"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(config.voice, "Kore");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.transcript_mode, TranscriptMode::Cumulative);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            load(&[("GEMINI_API_KEY", "abc"), ("MAX_RECONNECT_ATTEMPTS", "many")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            load(&[("GEMINI_API_KEY", "abc"), ("TRANSCRIPT_MODE", "both")]),
            Err(ConfigError::InvalidTranscriptMode(_))
        ));
        assert!(matches!(
            load(&[("GEMINI_API_KEY", "abc"), ("RUST_LOG", "loud")]),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }
}
