//! Risk aggregation
//!
//! Turns the configured markets into a single 0-100 score:
//!
//! ```text
//! per market: reading -> normalized risk (0-1) -> x weight
//! score = round(sum x 100) -> regime -> allocation
//! ```
//!
//! Markets are fetched concurrently. A market that cannot be read
//! contributes the neutral 0.5 and is tagged `Defaulted`.

pub mod outcomes;

use crate::client::{GammaEvent, MarketSource};
use crate::config::Config;
use crate::error::{Result, TreasuryError};
use crate::types::{
    AllocationTable, MarketConfig, MarketKind, MarketObservation, MarketStatus,
    ProbabilityReading, RegimeThresholds, RiskDirection, RiskSummary, NEUTRAL_PROBABILITY,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scale a raw 0-1 weighted sum to the public integer score
///
/// Rounds half away from zero (71.5 -> 72). Sums outside [0, 1], possible
/// when weights do not add up to 1.0, are clamped to the 0-100 range.
pub fn score_from_raw(raw: Decimal) -> u8 {
    let scaled = (raw * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    scaled
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
        .to_u8()
        .unwrap_or(0)
}

/// Anything that can produce a full risk summary
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummarySource: Send + Sync {
    async fn summarize(&self, now: DateTime<Utc>) -> Result<RiskSummary>;
}

/// Successful read of one market, before weighting
#[derive(Debug, Clone)]
struct Assessment {
    question: String,
    reading: Decimal,
    risk: Decimal,
    closed: bool,
    explanation: String,
}

/// Weighted-sum risk calculator over a fixed market set
pub struct RiskCalculator {
    source: Arc<dyn MarketSource>,
    markets: Vec<MarketConfig>,
    thresholds: RegimeThresholds,
    allocations: AllocationTable,
}

impl RiskCalculator {
    pub fn new(source: Arc<dyn MarketSource>, markets: Vec<MarketConfig>) -> Self {
        Self {
            source,
            markets,
            thresholds: RegimeThresholds::default(),
            allocations: AllocationTable::default(),
        }
    }

    pub fn from_config(source: Arc<dyn MarketSource>, config: &Config) -> Self {
        Self::new(source, config.markets.clone())
            .with_thresholds(config.risk.thresholds())
            .with_allocations(config.risk.allocations)
    }

    pub fn with_thresholds(mut self, thresholds: RegimeThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_allocations(mut self, allocations: AllocationTable) -> Self {
        self.allocations = allocations;
        self
    }

    pub fn markets(&self) -> &[MarketConfig] {
        &self.markets
    }

    /// Evaluate every market and build a summary
    ///
    /// Fails only when no markets are configured. Markets that cannot be read
    /// are scored as neutral, so a full upstream outage still yields 50.
    pub async fn calculate(&self, now: DateTime<Utc>) -> Result<RiskSummary> {
        if self.markets.is_empty() {
            return Err(TreasuryError::NoMarkets);
        }

        let observations = join_all(self.markets.iter().map(|m| self.observe(m))).await;

        let degraded = observations
            .iter()
            .filter(|o| o.reading.is_defaulted())
            .count();
        if degraded > 0 {
            warn!(
                "{} of {} markets unavailable, scored as neutral",
                degraded,
                observations.len()
            );
        }

        let raw: Decimal = observations.iter().map(|o| o.risk_contribution).sum();
        if raw > Decimal::ONE {
            warn!("Weighted risk sum {} exceeds 1.0; check market weights", raw);
        }

        let risk_score = score_from_raw(raw);
        let regime = self.thresholds.classify(risk_score);
        let allocation = self.allocations.get(regime);

        info!(
            "Risk score {} -> {} (base {}% / growth {}%)",
            risk_score, regime, allocation.base_pct, allocation.growth_pct
        );

        Ok(RiskSummary {
            risk_score,
            regime,
            recommended_base_pct: allocation.base_pct,
            recommended_growth_pct: allocation.growth_pct,
            explanations: observations.iter().map(|o| o.explanation.clone()).collect(),
            markets: observations,
            timestamp: now,
            cache_hit: false,
        })
    }

    /// Read one market, substituting neutral on any failure
    pub async fn observe(&self, market: &MarketConfig) -> MarketObservation {
        match self.assess(market).await {
            Ok(a) => {
                let status = if a.closed {
                    MarketStatus::Closed
                } else {
                    MarketStatus::Active
                };
                MarketObservation {
                    key: market.key.clone(),
                    slug: market.slug.clone(),
                    question: a.question,
                    probability: a.reading,
                    normalized_risk: a.risk,
                    weight: market.weight,
                    risk_contribution: a.risk * market.weight,
                    explanation: a.explanation,
                    status,
                    reading: ProbabilityReading::Observed(a.reading),
                }
            }
            Err(e) => {
                warn!("Market {} unavailable, using neutral: {}", market.slug, e);
                let explanation = match &e {
                    TreasuryError::MarketNotFound(_)
                    | TreasuryError::MalformedMarket { .. }
                    | TreasuryError::Json(_) => {
                        format!("{}: Market data unavailable, using neutral (50%)", market.slug)
                    }
                    _ => format!("{}: Error fetching data, using neutral (50%)", market.slug),
                };
                MarketObservation {
                    key: market.key.clone(),
                    slug: market.slug.clone(),
                    question: market.slug.clone(),
                    probability: NEUTRAL_PROBABILITY,
                    normalized_risk: NEUTRAL_PROBABILITY,
                    weight: market.weight,
                    risk_contribution: NEUTRAL_PROBABILITY * market.weight,
                    explanation,
                    status: MarketStatus::Error,
                    reading: ProbabilityReading::Defaulted(e.to_string()),
                }
            }
        }
    }

    async fn assess(&self, market: &MarketConfig) -> Result<Assessment> {
        match (market.kind, market.direction) {
            (MarketKind::Binary, RiskDirection::HigherYesIsMoreRisk) => {
                self.assess_binary(market).await
            }
            (MarketKind::Multi, RiskDirection::MonetaryStressFromCuts) => {
                let event = self.source.event_by_slug(&market.slug).await?;
                Ok(assess_rate_cuts(market, &event))
            }
            (MarketKind::Multi, RiskDirection::InverseBullProbability) => {
                let threshold = market.bull_threshold.ok_or_else(|| {
                    TreasuryError::InvalidConfig(format!(
                        "market {} needs a bull_threshold",
                        market.key
                    ))
                })?;
                let event = self.source.event_by_slug(&market.slug).await?;
                Ok(assess_bull(market, &event, threshold))
            }
            (kind, direction) => Err(TreasuryError::InvalidConfig(format!(
                "market {} pairs kind {:?} with direction {:?}",
                market.key, kind, direction
            ))),
        }
    }

    async fn assess_binary(&self, market: &MarketConfig) -> Result<Assessment> {
        let gm = self.source.market_by_slug(&market.slug).await?;
        let probability = gm.yes_probability(&market.slug)?;
        let question = non_empty_or(&gm.question, &market.slug);
        debug!("{} yes = {}", market.slug, probability);

        Ok(Assessment {
            explanation: format!(
                "{}: {:.1}% probability -> {:.1}% risk contribution",
                question,
                probability * Decimal::ONE_HUNDRED,
                probability * Decimal::ONE_HUNDRED
            ),
            question,
            reading: probability,
            risk: probability,
            closed: gm.closed,
        })
    }
}

#[async_trait]
impl SummarySource for RiskCalculator {
    async fn summarize(&self, now: DateTime<Utc>) -> Result<RiskSummary> {
        self.calculate(now).await
    }
}

fn assess_rate_cuts(market: &MarketConfig, event: &GammaEvent) -> Assessment {
    let cuts = outcomes::expected_cuts(event);
    let stress = outcomes::monetary_stress(cuts);
    debug!("{} expected cuts = {}", market.slug, cuts);

    Assessment {
        question: non_empty_or(&event.title, &market.slug),
        reading: cuts,
        risk: stress,
        closed: is_event_closed(event),
        explanation: format!(
            "Fed rate cuts: Expected {:.2} cuts -> {:.1}% monetary stress",
            cuts,
            stress * Decimal::ONE_HUNDRED
        ),
    }
}

fn assess_bull(market: &MarketConfig, event: &GammaEvent, threshold: Decimal) -> Assessment {
    let bull = outcomes::bull_probability(event, threshold);
    let risk = Decimal::ONE - bull;
    let question = non_empty_or(&event.title, &market.slug);
    debug!("{} bull probability >= {} = {}", market.slug, threshold, bull);

    Assessment {
        explanation: format!(
            "{}: {:.1}% bull probability -> {:.1}% risk contribution",
            question,
            bull * Decimal::ONE_HUNDRED,
            risk * Decimal::ONE_HUNDRED
        ),
        question,
        reading: bull,
        risk,
        closed: is_event_closed(event),
    }
}

/// An event is closed once every outcome market is
fn is_event_closed(event: &GammaEvent) -> bool {
    !event.markets.is_empty() && event.markets.iter().all(|m| m.closed)
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
