//! Treasury Risk Engine
//!
//! Scores macro and crypto risk from Polymarket prediction markets and maps
//! it to a cross-chain treasury allocation.
//!
//! ## Architecture
//!
//! ```text
//! Gamma API → RiskCalculator (per-market readings, weighted sum)
//!                  ↓
//!          Regime → Allocation
//!                  ↓
//!     RiskService (TTL cache, stale / neutral fallback) → HTTP API
//! ```

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod risk;
pub mod service;
pub mod testing;
pub mod types;
