//! Market Data Service
//!
//! Request/response facade over a [`StockDataPort`]. Validates input,
//! merges popular listings into short searches, spaces batch requests and
//! picks the right series for a chart period. Also serves as the
//! [`QuoteSource`] the realtime manager polls.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::ports::{BatchQuotes, QuoteSource, QuoteSourceError, StockDataPort};
use crate::domain::market::{
    ChartPeriod, MarketStatus, POPULAR_TSX_STOCKS, PopularStock, PricePoint, Quote, StockMatch,
    filter_by_period,
};
use crate::domain::subscription::Symbol;

/// Pause between consecutive requests of a batch.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Queries this short also get matching popular listings.
const POPULAR_MERGE_MAX_LEN: usize = 2;

/// High-level market data operations.
#[derive(Clone)]
pub struct MarketDataService {
    port: Arc<dyn StockDataPort>,
    batch_delay: Duration,
}

impl std::fmt::Debug for MarketDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataService")
            .field("batch_delay", &self.batch_delay)
            .finish_non_exhaustive()
    }
}

impl MarketDataService {
    /// Create a service over `port` with the default batch spacing.
    #[must_use]
    pub fn new(port: Arc<dyn StockDataPort>) -> Self {
        Self::with_batch_delay(port, DEFAULT_BATCH_DELAY)
    }

    /// Create a service with a custom pause between batch requests.
    #[must_use]
    pub fn with_batch_delay(port: Arc<dyn StockDataPort>, batch_delay: Duration) -> Self {
        Self { port, batch_delay }
    }

    /// Search Canadian listings.
    ///
    /// Queries of one or two characters are prefixed with matching entries
    /// from [`POPULAR_TSX_STOCKS`]; duplicates keep the first occurrence. If
    /// upstream fails for such a query but popular entries match, those are
    /// returned alone.
    ///
    /// # Errors
    ///
    /// [`QuoteSourceError::InvalidRequest`] for a blank query, otherwise
    /// whatever the backend reports.
    pub async fn search_stocks(&self, query: &str) -> Result<Vec<StockMatch>, QuoteSourceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QuoteSourceError::invalid(
                "search query must be at least 1 character",
            ));
        }

        let upstream = self.port.search(query).await;
        if query.chars().count() > POPULAR_MERGE_MAX_LEN {
            return upstream;
        }

        let popular: Vec<StockMatch> = POPULAR_TSX_STOCKS
            .iter()
            .filter(|stock| stock.matches(query))
            .map(PopularStock::to_match)
            .collect();

        let remote = match upstream {
            Ok(remote) => remote,
            Err(error) if !popular.is_empty() => {
                tracing::warn!(error = %error, query, "Search failed, serving popular listings only");
                Vec::new()
            }
            Err(error) => return Err(error),
        };

        let mut seen = HashSet::new();
        Ok(popular
            .into_iter()
            .chain(remote)
            .filter(|m| seen.insert(m.symbol.clone()))
            .collect())
    }

    /// Latest quote for one symbol.
    ///
    /// # Errors
    ///
    /// [`QuoteSourceError::InvalidRequest`] for a blank symbol, otherwise
    /// whatever the backend reports.
    pub async fn stock_quote(&self, symbol: &str) -> Result<Quote, QuoteSourceError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(QuoteSourceError::invalid("symbol is required"));
        }
        self.port.quote(symbol).await
    }

    /// Quotes for several symbols, fetched one at a time with
    /// `batch_delay` between requests. A failing symbol does not abort the
    /// batch.
    ///
    /// # Errors
    ///
    /// [`QuoteSourceError::InvalidRequest`] for an empty list.
    pub async fn multiple_quotes(&self, symbols: &[Symbol]) -> Result<BatchQuotes, QuoteSourceError> {
        if symbols.is_empty() {
            return Err(QuoteSourceError::invalid("symbols list is required"));
        }

        let mut batch = BatchQuotes::new();
        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            let result = self.stock_quote(symbol).await;
            if let Err(error) = &result {
                tracing::debug!(symbol = %symbol, error = %error, "Quote failed");
            }
            batch.insert(symbol.clone(), result);
        }
        Ok(batch)
    }

    /// Price series for a chart.
    ///
    /// [`ChartPeriod::OneDay`] uses intraday bars at `interval`; longer
    /// periods use the daily history trimmed to the period.
    ///
    /// # Errors
    ///
    /// [`QuoteSourceError::InvalidRequest`] for a blank symbol, otherwise
    /// whatever the backend reports.
    pub async fn chart_data(
        &self,
        symbol: &str,
        period: ChartPeriod,
        interval: &str,
    ) -> Result<Vec<PricePoint>, QuoteSourceError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(QuoteSourceError::invalid("symbol is required"));
        }

        if period.is_intraday() {
            return self.port.intraday(symbol, interval).await;
        }
        let daily = self.port.daily(symbol).await?;
        Ok(filter_by_period(daily, period, Utc::now()))
    }

    /// Confirm the backend is reachable, then report the local TSX session.
    ///
    /// # Errors
    ///
    /// Whatever the backend probe reports.
    pub async fn market_status(&self) -> Result<MarketStatus, QuoteSourceError> {
        self.port.probe().await?;
        Ok(MarketStatus::now())
    }

    /// Curated list of large TSX listings.
    #[must_use]
    pub const fn popular_stocks() -> &'static [PopularStock] {
        &POPULAR_TSX_STOCKS
    }
}

#[async_trait]
impl QuoteSource for MarketDataService {
    async fn market_status(&self) -> Result<MarketStatus, QuoteSourceError> {
        Self::market_status(self).await
    }

    async fn multiple_quotes(&self, symbols: &[Symbol]) -> Result<BatchQuotes, QuoteSourceError> {
        Self::multiple_quotes(self, symbols).await
    }
}
