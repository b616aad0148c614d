//! Scripted Quote Source
//!
//! In-process [`QuoteSource`] whose answers are set by the caller. Used by
//! tests and the demo mode of the binary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{BatchQuotes, QuoteSource, QuoteSourceError};
use crate::domain::market::{MarketStatus, Quote};
use crate::domain::subscription::Symbol;

/// A flat quote for `symbol` at `price`.
#[must_use]
pub fn sample_quote(symbol: &str, price: Decimal) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        open: price,
        high: price,
        low: price,
        price,
        volume: 10_000,
        latest_trading_day: Utc::now().date_naive(),
        previous_close: price,
        change: Decimal::ZERO,
        change_percent: Decimal::ZERO,
    }
}

#[derive(Default)]
struct Script {
    probe_error: Option<QuoteSourceError>,
    batch_error: Option<QuoteSourceError>,
    quotes: HashMap<Symbol, Quote>,
    failures: HashMap<Symbol, QuoteSourceError>,
    latency: Duration,
    last_batch: Vec<Symbol>,
}

/// Quote source driven by a script.
///
/// Unknown symbols quote at 100.
#[derive(Default)]
pub struct ScriptedQuoteSource {
    script: Mutex<Script>,
    probe_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    batches_in_flight: AtomicUsize,
    peak_batches_in_flight: AtomicUsize,
}

/// Counts one outstanding batch until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(current)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for ScriptedQuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedQuoteSource")
            .field("probe_calls", &self.probe_calls())
            .field("batch_calls", &self.batch_calls())
            .finish_non_exhaustive()
    }
}

impl ScriptedQuoteSource {
    /// Healthy source with no latency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every probe fail with `error` until [`Self::heal_probe`].
    pub fn fail_probe(&self, error: QuoteSourceError) {
        self.script.lock().probe_error = Some(error);
    }

    /// Let probes succeed again.
    pub fn heal_probe(&self) {
        self.script.lock().probe_error = None;
    }

    /// Fail whole batches with `error` until [`Self::heal_batch`].
    pub fn fail_batch(&self, error: QuoteSourceError) {
        self.script.lock().batch_error = Some(error);
    }

    /// Let batches through again.
    pub fn heal_batch(&self) {
        self.script.lock().batch_error = None;
    }

    /// Answer `symbol` with `quote`.
    pub fn set_quote(&self, symbol: &str, quote: Quote) {
        let mut script = self.script.lock();
        script.failures.remove(symbol);
        script.quotes.insert(symbol.to_string(), quote);
    }

    /// Fail `symbol` with `error` inside otherwise successful batches.
    pub fn fail_symbol(&self, symbol: &str, error: QuoteSourceError) {
        self.script.lock().failures.insert(symbol.to_string(), error);
    }

    /// Delay every answer by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.script.lock().latency = latency;
    }

    /// Number of probes so far.
    #[must_use]
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Number of batch requests so far.
    #[must_use]
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Most batch requests that were ever outstanding at once.
    #[must_use]
    pub fn peak_batches_in_flight(&self) -> usize {
        self.peak_batches_in_flight.load(Ordering::SeqCst)
    }

    /// Symbols of the most recent batch.
    #[must_use]
    pub fn last_batch(&self) -> Vec<Symbol> {
        self.script.lock().last_batch.clone()
    }

    async fn pause(&self) {
        let latency = self.script.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuoteSource {
    async fn market_status(&self) -> Result<MarketStatus, QuoteSourceError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let error = self.script.lock().probe_error.clone();
        error.map_or_else(|| Ok(MarketStatus::now()), Err)
    }

    async fn multiple_quotes(&self, symbols: &[Symbol]) -> Result<BatchQuotes, QuoteSourceError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.batches_in_flight, &self.peak_batches_in_flight);
        self.pause().await;

        let batch = {
            let mut script = self.script.lock();
            script.last_batch = symbols.to_vec();
            if let Some(error) = script.batch_error.clone() {
                return Err(error);
            }
            symbols
                .iter()
                .map(|symbol| {
                    let result = script.failures.get(symbol).cloned().map_or_else(
                        || {
                            Ok(script
                                .quotes
                                .get(symbol)
                                .cloned()
                                .unwrap_or_else(|| sample_quote(symbol, Decimal::ONE_HUNDRED)))
                        },
                        Err,
                    );
                    (symbol.clone(), result)
                })
                .collect()
        };
        Ok(batch)
    }
}
