//! Core types for risk scoring and allocation

use crate::error::{Result, TreasuryError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Probability substituted when a market cannot be read
pub const NEUTRAL_PROBABILITY: Decimal = dec!(0.5);

/// Market shape on the Gamma API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketKind {
    /// Single Yes/No market, fetched from `/markets`
    #[default]
    Binary,
    /// Event with one sub-market per outcome, fetched from `/events`
    Multi,
}

/// How a market's reading maps onto treasury risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDirection {
    /// Higher "Yes" probability means more risk
    #[default]
    HigherYesIsMoreRisk,
    /// Fewer expected rate cuts means more monetary stress
    MonetaryStressFromCuts,
    /// Lower probability of prices at or above a threshold means more risk
    InverseBullProbability,
}

/// Static configuration of one market in the risk budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Stable identifier used in responses
    pub key: String,
    /// Gamma API slug
    pub slug: String,
    /// Fraction of the total risk budget
    pub weight: Decimal,
    #[serde(default)]
    pub kind: MarketKind,
    #[serde(default)]
    pub direction: RiskDirection,
    /// Price at or above which an outcome counts as bullish
    #[serde(default)]
    pub bull_threshold: Option<Decimal>,
}

impl MarketConfig {
    /// Binary market where a higher "Yes" price means more risk
    pub fn binary(key: &str, slug: &str, weight: Decimal) -> Self {
        Self {
            key: key.to_string(),
            slug: slug.to_string(),
            weight,
            kind: MarketKind::Binary,
            direction: RiskDirection::HigherYesIsMoreRisk,
            bull_threshold: None,
        }
    }

    /// Multi-outcome market with the given risk direction
    pub fn multi(key: &str, slug: &str, weight: Decimal, direction: RiskDirection) -> Self {
        Self {
            key: key.to_string(),
            slug: slug.to_string(),
            weight,
            kind: MarketKind::Multi,
            direction,
            bull_threshold: None,
        }
    }

    pub fn with_bull_threshold(mut self, threshold: Decimal) -> Self {
        self.bull_threshold = Some(threshold);
        self
    }

    /// Check that kind, direction and threshold agree
    pub fn validate(&self) -> Result<()> {
        if self.weight < Decimal::ZERO {
            return Err(TreasuryError::InvalidConfig(format!(
                "market {} has negative weight {}",
                self.key, self.weight
            )));
        }

        match (self.kind, self.direction) {
            (MarketKind::Binary, RiskDirection::HigherYesIsMoreRisk) => Ok(()),
            (MarketKind::Multi, RiskDirection::MonetaryStressFromCuts) => Ok(()),
            (MarketKind::Multi, RiskDirection::InverseBullProbability) => {
                if self.bull_threshold.is_none() {
                    return Err(TreasuryError::InvalidConfig(format!(
                        "market {} needs a bull_threshold",
                        self.key
                    )));
                }
                Ok(())
            }
            (kind, direction) => Err(TreasuryError::InvalidConfig(format!(
                "market {} pairs kind {:?} with direction {:?}",
                self.key, kind, direction
            ))),
        }
    }
}

/// Discrete allocation mode derived from the risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    Aggressive,
    Neutral,
    Defensive,
}

impl Regime {
    /// Classify with the default 30 / 60 thresholds
    pub fn from_score(score: u8) -> Self {
        RegimeThresholds::default().classify(score)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Aggressive => "Aggressive",
            Regime::Neutral => "Neutral",
            Regime::Defensive => "Defensive",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive upper bounds of the two lower regimes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    pub aggressive_max: u8,
    pub neutral_max: u8,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            aggressive_max: 30,
            neutral_max: 60,
        }
    }
}

impl RegimeThresholds {
    /// Boundary scores belong to the lower regime
    pub fn classify(&self, score: u8) -> Regime {
        if score <= self.aggressive_max {
            Regime::Aggressive
        } else if score <= self.neutral_max {
            Regime::Neutral
        } else {
            Regime::Defensive
        }
    }
}

/// Percentage split between the base chain and the growth chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub base_pct: u8,
    pub growth_pct: u8,
}

impl Allocation {
    pub const fn new(base_pct: u8, growth_pct: u8) -> Self {
        Self {
            base_pct,
            growth_pct,
        }
    }

    /// Default table lookup
    pub fn for_regime(regime: Regime) -> Self {
        AllocationTable::default().get(regime)
    }

    pub fn is_complete(&self) -> bool {
        u16::from(self.base_pct) + u16::from(self.growth_pct) == 100
    }
}

/// Fixed allocation per regime, no interpolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationTable {
    pub aggressive: Allocation,
    pub neutral: Allocation,
    pub defensive: Allocation,
}

impl Default for AllocationTable {
    fn default() -> Self {
        Self {
            aggressive: Allocation::new(30, 70),
            neutral: Allocation::new(50, 50),
            defensive: Allocation::new(70, 30),
        }
    }
}

impl AllocationTable {
    pub fn get(&self, regime: Regime) -> Allocation {
        match regime {
            Regime::Aggressive => self.aggressive,
            Regime::Neutral => self.neutral,
            Regime::Defensive => self.defensive,
        }
    }
}

/// Where a market's raw reading came from
///
/// For binary markets and bull-probability events the value is a
/// probability in [0, 1]. For rate-cut events it is the expected number of
/// cuts, which may exceed 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum ProbabilityReading {
    /// Value read from the market (probability or expected cuts)
    Observed(#[serde(with = "rust_decimal::serde::float")] Decimal),
    /// Market unavailable; carries the reason
    Defaulted(String),
}

impl ProbabilityReading {
    /// Raw reading, neutral when defaulted
    pub fn probability(&self) -> Decimal {
        match self {
            ProbabilityReading::Observed(p) => *p,
            ProbabilityReading::Defaulted(_) => NEUTRAL_PROBABILITY,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, ProbabilityReading::Defaulted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Closed,
    Error,
}

/// Per-market result of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketObservation {
    pub key: String,
    pub slug: String,
    pub question: String,
    /// Raw reading: yes probability, bull probability or expected cuts
    #[serde(with = "rust_decimal::serde::float")]
    pub probability: Decimal,
    /// Reading mapped onto 0-1 risk
    #[serde(with = "rust_decimal::serde::float")]
    pub normalized_risk: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub weight: Decimal,
    /// normalized_risk x weight
    #[serde(with = "rust_decimal::serde::float")]
    pub risk_contribution: Decimal,
    pub explanation: String,
    pub status: MarketStatus,
    pub reading: ProbabilityReading,
}

/// Aggregate risk evaluation served to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub risk_score: u8,
    pub regime: Regime,
    pub recommended_base_pct: u8,
    #[serde(rename = "recommendedSolanaPct")]
    pub recommended_growth_pct: u8,
    pub explanations: Vec<String>,
    pub markets: Vec<MarketObservation>,
    pub timestamp: DateTime<Utc>,
    pub cache_hit: bool,
}

impl RiskSummary {
    /// Returned when nothing has ever been computed successfully
    pub fn neutral_fallback(timestamp: DateTime<Utc>) -> Self {
        let allocation = Allocation::for_regime(Regime::Neutral);
        Self {
            risk_score: 50,
            regime: Regime::Neutral,
            recommended_base_pct: allocation.base_pct,
            recommended_growth_pct: allocation.growth_pct,
            explanations: vec!["Error fetching market data. Using neutral fallback.".to_string()],
            markets: Vec::new(),
            timestamp,
            cache_hit: false,
        }
    }

    pub fn allocation(&self) -> Allocation {
        Allocation::new(self.recommended_base_pct, self.recommended_growth_pct)
    }

    /// Markets whose reading fell back to neutral
    pub fn degraded_markets(&self) -> impl Iterator<Item = &MarketObservation> {
        self.markets.iter().filter(|m| m.reading.is_defaulted())
    }
}
