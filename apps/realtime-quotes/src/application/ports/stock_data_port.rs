//! Stock Data Port (Driven Port)
//!
//! Low-level market data REST operations. Adapters own caching, rate
//! limiting and wire formats; callers see domain types only.

use async_trait::async_trait;

use super::QuoteSourceError;
use crate::domain::market::{PricePoint, Quote, StockMatch};

/// Port for a market data REST backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StockDataPort: Send + Sync {
    /// Cheap reachability check against the upstream API.
    async fn probe(&self) -> Result<(), QuoteSourceError>;

    /// Latest quote for one symbol.
    async fn quote(&self, symbol: &str) -> Result<Quote, QuoteSourceError>;

    /// Symbol search, already filtered to Canadian listings and sorted by
    /// match score, best first.
    async fn search(&self, query: &str) -> Result<Vec<StockMatch>, QuoteSourceError>;

    /// Intraday bars at `interval` (e.g. `5min`), oldest first.
    async fn intraday(&self, symbol: &str, interval: &str)
    -> Result<Vec<PricePoint>, QuoteSourceError>;

    /// Full daily history, oldest first.
    async fn daily(&self, symbol: &str) -> Result<Vec<PricePoint>, QuoteSourceError>;
}
