//! Cached risk summary with availability-first fallbacks
//!
//! Callers always get a summary:
//! - fresh cache entry -> returned with `cache_hit = true`
//! - otherwise recompute and overwrite the cache
//! - recompute failed -> stale entry with a warning, or the neutral fallback
//!
//! Concurrent misses each recompute; requests are not deduplicated.

use crate::cache::{Clock, SummaryCache, SystemClock};
use crate::client::GammaClient;
use crate::config::Config;
use crate::error::Result;
use crate::risk::{RiskCalculator, SummarySource};
use crate::types::RiskSummary;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const STALE_WARNING: &str = "Warning: Using stale cached data due to API error.";

pub struct RiskService {
    source: Arc<dyn SummarySource>,
    cache: SummaryCache,
    clock: Arc<dyn Clock>,
}

impl RiskService {
    pub fn new(calculator: RiskCalculator, cache: SummaryCache, clock: Arc<dyn Clock>) -> Self {
        Self::with_source(Arc::new(calculator), cache, clock)
    }

    pub fn with_source(
        source: Arc<dyn SummarySource>,
        cache: SummaryCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            cache,
            clock,
        }
    }

    /// Gamma-backed service on the wall clock
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = GammaClient::new(&config.gamma)?;
        info!(
            "Risk service using {} with {} markets, cache TTL {}s",
            client.base_url(),
            config.markets.len(),
            config.risk.cache_ttl_secs
        );

        let calculator = RiskCalculator::from_config(Arc::new(client), config);
        Ok(Self::new(
            calculator,
            SummaryCache::new(config.risk.cache_ttl()),
            Arc::new(SystemClock),
        ))
    }

    pub fn cache(&self) -> &SummaryCache {
        &self.cache
    }

    /// Current summary; never fails
    pub async fn current_summary(&self) -> RiskSummary {
        let now = self.clock.now();

        if let Some(entry) = self.cache.fresh(now) {
            debug!("Risk summary cache hit (age {}s)", entry.age(now).num_seconds());
            let mut summary = entry.summary;
            summary.cache_hit = true;
            return summary;
        }

        self.recompute().await
    }

    /// Skip the freshness check and recompute, keeping the fallback policy
    pub async fn recompute(&self) -> RiskSummary {
        let now = self.clock.now();

        match self.source.summarize(now).await {
            Ok(summary) => {
                self.cache.set(summary.clone(), self.clock.now());
                summary
            }
            Err(e) => {
                error!("Risk calculation failed: {}", e);
                match self.cache.get() {
                    Some(entry) => {
                        let mut summary = entry.summary;
                        summary.cache_hit = true;
                        summary.explanations.push(STALE_WARNING.to_string());
                        summary
                    }
                    None => RiskSummary::neutral_fallback(now),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{GammaMarket, MockMarketSource, OutcomePrices};
    use crate::error::TreasuryError;
    use crate::risk::MockSummarySource;
    use crate::testing::ManualClock;
    use crate::types::{MarketConfig, MarketStatus, Regime};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn market(yes: &str) -> GammaMarket {
        GammaMarket {
            question: "Recession?".to_string(),
            outcome_prices: Some(OutcomePrices::Encoded(format!("[\"{}\", \"0\"]", yes))),
            ..Default::default()
        }
    }

    struct Harness {
        service: RiskService,
        clock: Arc<ManualClock>,
        calls: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
    }

    /// One market at 0.8; `failing` makes every fetch error
    fn harness() -> Harness {
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicBool::new(false));

        let mut source = MockMarketSource::new();
        let (c, f) = (calls.clone(), failing.clone());
        source.expect_market_by_slug().returning(move |slug| {
            c.fetch_add(1, Ordering::SeqCst);
            if f.load(Ordering::SeqCst) {
                Err(TreasuryError::Api(format!("{} down", slug)))
            } else {
                Ok(market("0.8"))
            }
        });

        let clock = Arc::new(ManualClock::default());
        let calculator = RiskCalculator::new(
            Arc::new(source),
            vec![MarketConfig::binary("recession", "us-recession", dec!(1.0))],
        );
        let service = RiskService::new(
            calculator,
            SummaryCache::new(Duration::from_secs(60)),
            clock.clone(),
        );

        Harness {
            service,
            clock,
            calls,
            failing,
        }
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let h = harness();

        let first = h.service.current_summary().await;
        h.clock.advance(Duration::from_secs(30));
        let second = h.service.current_summary().await;

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);

        let mut normalized = second.clone();
        normalized.cache_hit = false;
        assert_eq!(normalized, first);
    }

    #[tokio::test]
    async fn test_recompute_after_ttl() {
        let h = harness();

        h.service.current_summary().await;
        h.clock.advance(Duration::from_secs(60));
        let summary = h.service.current_summary().await;

        assert!(!summary.cache_hit);
        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.timestamp, h.clock.now());
    }

    #[tokio::test]
    async fn test_upstream_outage_scores_neutral() {
        let h = harness();

        h.service.current_summary().await;
        h.clock.advance(Duration::from_secs(120));
        h.failing.store(true, Ordering::SeqCst);

        let summary = h.service.current_summary().await;

        assert_eq!(summary.risk_score, 50);
        assert_eq!(summary.regime, Regime::Neutral);
        assert!(!summary.cache_hit);
        assert_eq!(summary.markets.len(), 1);
        assert_eq!(summary.markets[0].status, MarketStatus::Error);
        assert!(!summary.explanations.iter().any(|e| e == STALE_WARNING));

        // the degraded summary replaces the old entry
        let cached = h.service.cache().get().unwrap();
        assert_eq!(cached.summary, summary);
    }

    #[tokio::test]
    async fn test_stale_cache_on_failure() {
        let clock = Arc::new(ManualClock::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut source = MockSummarySource::new();
        let c = calls.clone();
        source.expect_summarize().returning(move |now| {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                let mut summary = RiskSummary::neutral_fallback(now);
                summary.risk_score = 80;
                summary.regime = Regime::Defensive;
                summary.explanations = vec!["Recession?: 80.0%".to_string()];
                Ok(summary)
            } else {
                Err(TreasuryError::NoMarkets)
            }
        });
        let service = RiskService::with_source(
            Arc::new(source),
            SummaryCache::new(Duration::from_secs(60)),
            clock.clone(),
        );

        let fresh = service.current_summary().await;
        clock.advance(Duration::from_secs(120));
        let stale = service.current_summary().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(stale.cache_hit);
        assert_eq!(stale.risk_score, 80);
        assert_eq!(stale.timestamp, fresh.timestamp);
        assert_eq!(stale.explanations.last().map(String::as_str), Some(STALE_WARNING));
        assert_eq!(stale.explanations.len(), fresh.explanations.len() + 1);

        // the stored entry is not mutated by the warning
        let cached = service.cache().get().unwrap();
        assert_eq!(cached.summary, fresh);
    }

    #[tokio::test]
    async fn test_neutral_fallback_without_cache() {
        let calculator = RiskCalculator::new(Arc::new(MockMarketSource::new()), vec![]);
        let service = RiskService::new(
            calculator,
            SummaryCache::new(Duration::from_secs(60)),
            Arc::new(ManualClock::default()),
        );

        let summary = service.current_summary().await;

        assert_eq!(summary.risk_score, 50);
        assert_eq!(summary.regime, Regime::Neutral);
        assert_eq!(summary.recommended_base_pct, 50);
        assert_eq!(summary.recommended_growth_pct, 50);
        assert!(summary.markets.is_empty());
        assert!(!summary.cache_hit);
        assert!(service.cache().get().is_none());
    }

    #[tokio::test]
    async fn test_recompute_bypasses_fresh_entry() {
        let h = harness();

        h.service.current_summary().await;
        let summary = h.service.recompute().await;

        assert!(!summary.cache_hit);
        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.risk_score, 80);
        assert_eq!(summary.regime, Regime::Defensive);
    }
}
