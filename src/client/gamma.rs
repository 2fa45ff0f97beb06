//! Gamma API client for market data
//!
//! Looks up binary markets and multi-outcome events by slug.

use super::MarketSource;
use crate::config::GammaConfig;
use crate::error::{Result, TreasuryError};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Gamma API client for market data
#[derive(Clone)]
pub struct GammaClient {
    http: Client,
    base_url: String,
}

/// Market as returned by `/markets` or nested in an event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GammaMarket {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(rename = "outcomePrices", default)]
    pub outcome_prices: Option<OutcomePrices>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub closed: bool,
}

/// Event with one sub-market per outcome
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GammaEvent {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}

/// `outcomePrices` arrives either as a JSON-encoded string `"[\"0.55\", \"0.45\"]"`
/// or as a real array
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OutcomePrices {
    Encoded(String),
    List(Vec<serde_json::Value>),
}

impl OutcomePrices {
    /// Prices in outcome order; unparseable entries become `None`
    pub fn values(&self) -> Vec<Option<Decimal>> {
        let raw: Vec<serde_json::Value> = match self {
            OutcomePrices::Encoded(s) => serde_json::from_str(s).unwrap_or_default(),
            OutcomePrices::List(values) => values.clone(),
        };

        raw.iter().map(parse_price).collect()
    }
}

fn parse_price(value: &serde_json::Value) -> Option<Decimal> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };

    text.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&text).ok())
}

impl GammaMarket {
    /// First outcome price, treated as "Yes"
    pub fn yes_price(&self) -> Option<Decimal> {
        self.outcome_prices
            .as_ref()
            .and_then(|p| p.values().into_iter().next())
            .flatten()
    }

    /// Yes probability, rejecting missing or out-of-range prices
    pub fn yes_probability(&self, slug: &str) -> Result<Decimal> {
        let price = self.yes_price().ok_or_else(|| TreasuryError::MalformedMarket {
            slug: slug.to_string(),
            reason: "missing or unparseable outcomePrices".to_string(),
        })?;

        if price < Decimal::ZERO || price > Decimal::ONE {
            return Err(TreasuryError::MalformedMarket {
                slug: slug.to_string(),
                reason: format!("yes price {} outside [0, 1]", price),
            });
        }

        Ok(price)
    }
}

impl GammaClient {
    /// Create a new Gamma client
    pub fn new(config: &GammaConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base}/{resource}?slug=..` and return the first array element
    async fn first_by_slug<T: DeserializeOwned>(&self, resource: &str, slug: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, resource);
        debug!("Fetching {} {}", resource, slug);

        let resp = self
            .http
            .get(&url)
            .query(&[("slug", slug)])
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TreasuryError::Api(format!(
                "Gamma {} lookup for {} returned {}",
                resource, slug, status
            )));
        }

        let body = resp.bytes().await?;
        let items: Vec<T> = serde_json::from_slice(&body)?;
        items
            .into_iter()
            .next()
            .ok_or_else(|| TreasuryError::MarketNotFound(slug.to_string()))
    }
}

#[async_trait]
impl MarketSource for GammaClient {
    async fn market_by_slug(&self, slug: &str) -> Result<GammaMarket> {
        self.first_by_slug("markets", slug).await
    }

    async fn event_by_slug(&self, slug: &str) -> Result<GammaEvent> {
        self.first_by_slug("events", slug).await
    }
}
