//! Polymarket data clients

pub mod gamma;

pub use gamma::{GammaClient, GammaEvent, GammaMarket, OutcomePrices};

use crate::error::Result;
use async_trait::async_trait;

/// Source of market data keyed by slug
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Binary market lookup
    async fn market_by_slug(&self, slug: &str) -> Result<GammaMarket>;

    /// Multi-outcome event lookup
    async fn event_by_slug(&self, slug: &str) -> Result<GammaEvent>;
}
