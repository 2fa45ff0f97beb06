//! Configuration management
//!
//! Values come from an optional TOML file, then `TREASURY__*` environment
//! variables (`TREASURY__SERVER__PORT=9000`). A `.env` file is honoured.

use crate::error::{Result, TreasuryError};
use crate::types::{AllocationTable, MarketConfig, RegimeThresholds, RiskDirection};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable kept for compatibility with existing deployments
pub const GAMMA_URL_ENV: &str = "POLYMARKET_GAMMA_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gamma: GammaConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default = "default_markets")]
    pub markets: Vec<MarketConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            gamma: GammaConfig::default(),
            risk: RiskConfig::default(),
            markets: default_markets(),
        }
    }
}

impl Config {
    /// Load from file (if present) and environment, then validate
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("TREASURY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: Config = settings.try_deserialize()?;

        if let Ok(url) = std::env::var(GAMMA_URL_ENV) {
            if !url.trim().is_empty() {
                cfg.gamma.base_url = url;
            }
        }

        cfg.validate()?;

        let sum = cfg.weight_sum();
        if sum != Decimal::ONE {
            tracing::warn!(
                "Market weights sum to {} instead of 1.0; scores are not normalized",
                sum
            );
        }

        Ok(cfg)
    }

    /// Structural checks; a weight sum other than 1.0 is not an error
    pub fn validate(&self) -> Result<()> {
        if self.markets.is_empty() {
            return Err(TreasuryError::NoMarkets);
        }

        let mut seen = std::collections::HashSet::new();
        for market in &self.markets {
            market.validate()?;
            if !seen.insert(market.key.as_str()) {
                return Err(TreasuryError::InvalidConfig(format!(
                    "duplicate market key {}",
                    market.key
                )));
            }
        }

        self.risk.validate()
    }

    pub fn weight_sum(&self) -> Decimal {
        self.markets.iter().map(|m| m.weight).sum()
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Polymarket Gamma API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaConfig {
    #[serde(default = "default_gamma_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            base_url: default_gamma_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GammaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Scoring, regime and cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_aggressive_max")]
    pub aggressive_max: u8,
    #[serde(default = "default_neutral_max")]
    pub neutral_max: u8,
    #[serde(default)]
    pub allocations: AllocationTable,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            aggressive_max: default_aggressive_max(),
            neutral_max: default_neutral_max(),
            allocations: AllocationTable::default(),
        }
    }
}

impl RiskConfig {
    pub fn thresholds(&self) -> RegimeThresholds {
        RegimeThresholds {
            aggressive_max: self.aggressive_max,
            neutral_max: self.neutral_max,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.aggressive_max >= self.neutral_max || self.neutral_max >= 100 {
            return Err(TreasuryError::InvalidConfig(format!(
                "regime thresholds must satisfy aggressive_max < neutral_max < 100, got {} / {}",
                self.aggressive_max, self.neutral_max
            )));
        }

        let rows = [
            ("aggressive", self.allocations.aggressive),
            ("neutral", self.allocations.neutral),
            ("defensive", self.allocations.defensive),
        ];
        for (name, allocation) in rows {
            if !allocation.is_complete() {
                return Err(TreasuryError::InvalidConfig(format!(
                    "{} allocation {}/{} does not sum to 100",
                    name, allocation.base_pct, allocation.growth_pct
                )));
            }
        }

        Ok(())
    }
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_aggressive_max() -> u8 {
    30
}

fn default_neutral_max() -> u8 {
    60
}

/// Recession, rate-cut and crypto price markets; weights sum to 1.0
pub fn default_markets() -> Vec<MarketConfig> {
    vec![
        MarketConfig::binary("us_recession_2026", "us-recession-by-end-of-2026", dec!(0.25)),
        MarketConfig::binary("us_recession_2025", "us-recession-in-2025", dec!(0.20)),
        MarketConfig::multi(
            "fed_cuts_2025",
            "how-many-fed-rate-cuts-in-2025",
            dec!(0.15),
            RiskDirection::MonetaryStressFromCuts,
        ),
        MarketConfig::multi(
            "btc_2025_price",
            "what-price-will-bitcoin-hit-in-2025",
            dec!(0.25),
            RiskDirection::InverseBullProbability,
        )
        .with_bull_threshold(dec!(95000)),
        MarketConfig::multi(
            "eth_2025_price",
            "what-price-will-ethereum-hit-in-2025",
            dec!(0.15),
            RiskDirection::InverseBullProbability,
        )
        .with_bull_threshold(dec!(5000)),
    ]
}
