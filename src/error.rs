//! Error types for the trading engine

use thiserror::Error;

/// Result type alias using our custom error
pub type Result<T> = std::result::Result<T, BotError>;

/// Main error type
#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Market not found: {0}")]
    MarketNotFound(String),

    #[error("Unknown strategy: {0} (available: whale, volume, sport, elon, sport-whale)")]
    UnknownStrategy(String),

    #[error("No instructions to execute")]
    EmptyInstructions,

    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}

impl BotError {
    /// Whether the error is a configuration or logic problem that should skip
    /// the round rather than be retried.
    pub fn is_round_fatal(&self) -> bool {
        matches!(
            self,
            BotError::Config(_)
                | BotError::UnknownStrategy(_)
                | BotError::EmptyInstructions
                | BotError::InvalidInstruction(_)
        )
    }
}
