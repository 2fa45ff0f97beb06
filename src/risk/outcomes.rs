//! Readings derived from multi-outcome events
//!
//! Each sub-market's question names the outcome ("2 cuts", "Will Bitcoin
//! reach $120,000?"); its first outcome price is that outcome's probability.

use crate::client::GammaEvent;
use crate::types::NEUTRAL_PROBABILITY;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::LazyLock;

/// Expected cuts at or above which monetary stress is zero
pub const FULL_EASING_CUTS: Decimal = dec!(3);

static CUTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\+?\s*cut").expect("static regex"));

static DOLLAR_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s?(\d[\d,]*(?:\.\d+)?)([km])?").expect("static regex"));

static SUFFIX_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d[\d,]*(?:\.\d+)?)k\b").expect("static regex"));

static ARROW_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"↑\s*(\d[\d,]*(?:\.\d+)?)").expect("static regex"));

/// Bare number closing the question or followed by `+` / `?`
static BARE_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(\d[\d,]*(?:\.\d+)?)\s*(?:\+|\?|$)").expect("static regex")
});

static DOWNSIDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:dips?|drops?|falls?)\s+(?:to|below|under)\b|\bbelow\b|↓")
        .expect("static regex")
});

/// Probability-weighted number of rate cuts
///
/// Outcomes like "3+ cuts" count as their stated floor. The result is
/// renormalised when the matched probabilities do not sum to 1. An event
/// with no cut outcomes expects zero cuts.
pub fn expected_cuts(event: &GammaEvent) -> Decimal {
    let mut expected = Decimal::ZERO;
    let mut mass = Decimal::ZERO;

    for market in &event.markets {
        let question = market.question.to_lowercase();
        let Some(caps) = CUTS_RE.captures(&question) else {
            continue;
        };
        let Ok(cuts) = caps[1].parse::<u32>() else {
            continue;
        };

        let prob = market.yes_price().unwrap_or(Decimal::ZERO);
        expected += Decimal::from(cuts) * prob;
        mass += prob;
    }

    if mass > Decimal::ZERO && mass != Decimal::ONE {
        expected /= mass;
    }

    expected
}

/// Stress in [0, 1]: no cuts is full stress, `FULL_EASING_CUTS` or more is none
pub fn monetary_stress(expected_cuts: Decimal) -> Decimal {
    let eased = (expected_cuts / FULL_EASING_CUTS).min(Decimal::ONE).max(Decimal::ZERO);
    Decimal::ONE - eased
}

/// Sum of probabilities of upside outcomes priced at or above `threshold`
///
/// Downside outcomes ("dip to $70,000") are ignored and the sum is clamped to
/// [0, 1]. An event without sub-markets reads as neutral.
pub fn bull_probability(event: &GammaEvent, threshold: Decimal) -> Decimal {
    if event.markets.is_empty() {
        return NEUTRAL_PROBABILITY;
    }

    let mut bull = Decimal::ZERO;

    for market in &event.markets {
        let question = market.question.to_lowercase();
        let Some(price) = outcome_price(&question) else {
            continue;
        };
        if is_downside(&question) {
            continue;
        }

        if price >= threshold {
            bull += market.yes_price().unwrap_or(Decimal::ZERO);
        }
    }

    bull.min(Decimal::ONE).max(Decimal::ZERO)
}

/// Outcome describes a move down to its price; expects a lowercased question
fn is_downside(question: &str) -> bool {
    DOWNSIDE_RE.is_match(question)
}

/// Price named in an outcome question
///
/// Tried in order: `$100,000` / `$95k` / `$1.5m`, then `120k`, then
/// `↑ 5000`, then a bare `95,000+`, `100000?` or trailing number.
pub fn outcome_price(question: &str) -> Option<Decimal> {
    if let Some(caps) = DOLLAR_PRICE_RE.captures(question) {
        let base = parse_amount(&caps[1])?;
        let multiplier = match caps.get(2).map(|m| m.as_str()) {
            Some("k") => dec!(1000),
            Some("m") => dec!(1000000),
            _ => Decimal::ONE,
        };
        return Some(base * multiplier);
    }

    if let Some(caps) = SUFFIX_PRICE_RE.captures(question) {
        return parse_amount(&caps[1]).map(|base| base * dec!(1000));
    }

    ARROW_PRICE_RE
        .captures(question)
        .or_else(|| BARE_PRICE_RE.captures(question))
        .and_then(|caps| parse_amount(&caps[1]))
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    raw.replace(',', "").parse::<Decimal>().ok()
}
