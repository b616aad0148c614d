//! Quote Source Port (Driven Port)
//!
//! What the realtime manager needs from a market data backend: a cheap
//! reachability probe and a batch quote fetch with per-symbol results.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::market::{MarketStatus, Quote};
use crate::domain::subscription::Symbol;

/// Quote source error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteSourceError {
    /// Transport failure (DNS, TCP, TLS, timeout).
    #[error("network error: {message}")]
    Network {
        /// Error details.
        message: String,
    },

    /// Upstream answered with an error.
    #[error("API error: {message}")]
    Api {
        /// HTTP status, when the error came from the status line.
        status: Option<u16>,
        /// Error details.
        message: String,
    },

    /// Upstream throttled the request.
    #[error("API rate limit: {message}")]
    RateLimited {
        /// Upstream notice.
        message: String,
    },

    /// No API key configured. Not retried.
    #[error("market data API key not configured")]
    MissingCredentials,

    /// Upstream answered but the expected payload was absent.
    #[error("no {what} data available")]
    NoData {
        /// Which payload was missing (quote, intraday, daily).
        what: String,
    },

    /// Caller passed an unusable argument.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Error details.
        message: String,
    },

    /// Payload could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        /// Error details.
        message: String,
    },
}

impl QuoteSourceError {
    /// True for failures that mean the source is unreachable, which should
    /// drop the logical connection and trigger a reconnect.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Api { .. })
    }

    /// False for configuration and caller errors, which a retry cannot fix.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::MissingCredentials | Self::InvalidRequest { .. }
        )
    }

    /// Shorthand for a [`QuoteSourceError::Network`].
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Shorthand for a [`QuoteSourceError::InvalidRequest`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

/// Per-symbol outcome of a batch quote fetch, ordered by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchQuotes {
    results: BTreeMap<Symbol, Result<Quote, QuoteSourceError>>,
}

impl BatchQuotes {
    /// Empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            results: BTreeMap::new(),
        }
    }

    /// Record one symbol's outcome.
    pub fn insert(&mut self, symbol: Symbol, result: Result<Quote, QuoteSourceError>) {
        self.results.insert(symbol, result);
    }

    /// True when no symbol failed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.results.values().all(Result::is_ok)
    }

    /// Number of symbols in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True for an empty batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Outcome for one symbol.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&Result<Quote, QuoteSourceError>> {
        self.results.get(symbol)
    }

    /// Successful quotes in symbol order.
    pub fn quotes(&self) -> impl Iterator<Item = (&Symbol, &Quote)> {
        self.results
            .iter()
            .filter_map(|(s, r)| r.as_ref().ok().map(|q| (s, q)))
    }

    /// Failures in symbol order.
    pub fn failures(&self) -> impl Iterator<Item = (&Symbol, &QuoteSourceError)> {
        self.results
            .iter()
            .filter_map(|(s, r)| r.as_ref().err().map(|e| (s, e)))
    }

    /// Aggregated failure message, `"SYM: reason; SYM2: reason"`.
    /// `None` when nothing failed.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        let parts: Vec<String> = self
            .failures()
            .map(|(symbol, err)| format!("{symbol}: {err}"))
            .collect();
        (!parts.is_empty()).then(|| parts.join("; "))
    }

    /// True when every symbol failed with a connectivity error.
    #[must_use]
    pub fn all_failed_connectivity(&self) -> bool {
        !self.results.is_empty()
            && self
                .results
                .values()
                .all(|r| r.as_ref().is_err_and(QuoteSourceError::is_connectivity))
    }
}

impl FromIterator<(Symbol, Result<Quote, QuoteSourceError>)> for BatchQuotes {
    fn from_iter<I: IntoIterator<Item = (Symbol, Result<Quote, QuoteSourceError>)>>(
        iter: I,
    ) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

/// Port the realtime manager polls.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Probe the source. Success means the logical connection is up.
    async fn market_status(&self) -> Result<MarketStatus, QuoteSourceError>;

    /// Fetch quotes for several symbols, isolating per-symbol failures.
    ///
    /// An `Err` means the batch as a whole could not be attempted.
    async fn multiple_quotes(&self, symbols: &[Symbol]) -> Result<BatchQuotes, QuoteSourceError>;
}
