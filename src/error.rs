//! Error types for the risk engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TreasuryError>;

#[derive(Debug, Error)]
pub enum TreasuryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Market not found: {0}")]
    MarketNotFound(String),

    #[error("Malformed market data for {slug}: {reason}")]
    MalformedMarket { slug: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No markets configured")]
    NoMarkets,
}
