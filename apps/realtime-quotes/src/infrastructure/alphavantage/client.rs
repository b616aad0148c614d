//! Alpha Vantage REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::time::Instant;

use super::cache::{CacheTtl, ResponseCache};
use super::messages::{
    Envelope, GlobalQuoteResponse, RawSeries, SearchResponse, SeriesClock, series_to_points,
};
use crate::application::ports::{QuoteSourceError, StockDataPort};
use crate::domain::market::{PricePoint, Quote, StockMatch};
use crate::infrastructure::config::ApiKey;
use crate::infrastructure::metrics;

/// Production query endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct AlphaVantageConfig {
    /// Query endpoint.
    pub base_url: String,
    /// API key. Every call fails with `MissingCredentials` without one.
    pub api_key: Option<ApiKey>,
    /// Minimum spacing between upstream calls. Cache hits are not spaced.
    pub min_request_interval: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Cache lifetimes.
    pub cache_ttl: CacheTtl,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            min_request_interval: Duration::from_secs(12),
            request_timeout: Duration::from_secs(10),
            cache_ttl: CacheTtl::default(),
        }
    }
}

/// Append `.TO` to a bare ticker. Symbols that already name an exchange
/// (`.` or `:`) are left alone.
///
/// ```rust
/// use realtime_quotes::infrastructure::alphavantage::format_tsx_symbol;
///
/// assert_eq!(format_tsx_symbol("SHOP"), "SHOP.TO");
/// assert_eq!(format_tsx_symbol("ABC.V"), "ABC.V");
/// assert_eq!(format_tsx_symbol("TSX:RY"), "TSX:RY");
/// ```
#[must_use]
pub fn format_tsx_symbol(symbol: &str) -> String {
    if symbol.contains('.') || symbol.contains(':') {
        symbol.to_string()
    } else {
        format!("{symbol}.TO")
    }
}

/// One upstream call: function name, query parameters and cache policy.
struct Call<'a> {
    function: &'static str,
    params: Vec<(&'static str, &'a str)>,
    cache_key: String,
    ttl: Duration,
}

/// Alpha Vantage adapter for [`StockDataPort`].
///
/// Responses are cached per request and upstream calls are serialized with
/// at least `min_request_interval` between them.
pub struct AlphaVantageClient {
    http: Client,
    config: AlphaVantageConfig,
    cache: ResponseCache,
    last_call: tokio::sync::Mutex<Option<Instant>>,
}

impl std::fmt::Debug for AlphaVantageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageClient")
            .field("base_url", &self.config.base_url)
            .field("has_api_key", &self.config.api_key.is_some())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl AlphaVantageClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteSourceError::Network`] if the HTTP client cannot be
    /// built.
    pub fn new(config: AlphaVantageConfig) -> Result<Self, QuoteSourceError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| QuoteSourceError::network(e.to_string()))?;

        if config.api_key.is_none() {
            tracing::warn!("Alpha Vantage API key not configured, data calls will fail");
        }

        Ok(Self {
            http,
            config,
            cache: ResponseCache::default(),
            last_call: tokio::sync::Mutex::new(None),
        })
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached responses.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    async fn fetch<T: DeserializeOwned>(&self, call: Call<'_>) -> Result<T, QuoteSourceError> {
        let body = self.fetch_value(call).await?;
        serde_json::from_value(body).map_err(|e| QuoteSourceError::Decode {
            message: e.to_string(),
        })
    }

    async fn fetch_value(&self, call: Call<'_>) -> Result<serde_json::Value, QuoteSourceError> {
        let Some(api_key) = &self.config.api_key else {
            return Err(QuoteSourceError::MissingCredentials);
        };

        if let Some(body) = self.cache.get(call.function, &call.cache_key) {
            tracing::trace!(function = call.function, key = %call.cache_key, "Cache hit");
            return Ok(body);
        }

        self.wait_for_rate_limit().await;

        let mut query: Vec<(&str, &str)> = call.params.clone();
        query.push(("function", call.function));
        query.push(("apikey", api_key.expose()));

        tracing::debug!(function = call.function, key = %call.cache_key, "Alpha Vantage request");
        let started = Instant::now();
        let result = self.send(&query).await;
        metrics::record_upstream_request(call.function, result.is_ok(), started.elapsed());

        let body = result?;
        self.cache.insert(call.cache_key, body.clone(), call.ttl);
        Ok(body)
    }

    async fn send(&self, query: &[(&str, &str)]) -> Result<serde_json::Value, QuoteSourceError> {
        let response = self
            .http
            .get(&self.config.base_url)
            .query(query)
            .send()
            .await
            .map_err(|e| QuoteSourceError::network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuoteSourceError::Api {
                status: Some(status.as_u16()),
                message: format!(
                    "request failed: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )
                .trim_end()
                .to_string(),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QuoteSourceError::Decode {
                message: e.without_url().to_string(),
            })?;

        let envelope: Envelope = serde_json::from_value(body.clone()).unwrap_or_default();
        if let Some(error) = envelope.into_error() {
            return Err(error);
        }
        Ok(body)
    }

    /// Hold the call slot until `min_request_interval` has passed since the
    /// previous upstream call.
    async fn wait_for_rate_limit(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.config.min_request_interval {
                let wait = self.config.min_request_interval - elapsed;
                tracing::debug!(
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "Rate limit wait"
                );
                tokio::time::sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[async_trait]
impl StockDataPort for AlphaVantageClient {
    async fn probe(&self) -> Result<(), QuoteSourceError> {
        self.fetch_value(Call {
            function: "MARKET_STATUS",
            params: Vec::new(),
            cache_key: "market_status".to_string(),
            ttl: self.config.cache_ttl.market_status,
        })
        .await
        .map(|_| ())
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, QuoteSourceError> {
        let symbol = format_tsx_symbol(symbol);
        let response: GlobalQuoteResponse = self
            .fetch(Call {
                function: "GLOBAL_QUOTE",
                params: vec![("symbol", symbol.as_str())],
                cache_key: format!("quote_{symbol}"),
                ttl: self.config.cache_ttl.quote,
            })
            .await?;

        response
            .global_quote
            .ok_or_else(|| QuoteSourceError::NoData {
                what: "quote".to_string(),
            })?
            .into_quote()
    }

    async fn search(&self, query: &str) -> Result<Vec<StockMatch>, QuoteSourceError> {
        let response: SearchResponse = self
            .fetch(Call {
                function: "SYMBOL_SEARCH",
                params: vec![("keywords", query)],
                cache_key: format!("search_{query}"),
                ttl: self.config.cache_ttl.search,
            })
            .await?;

        let mut matches: Vec<StockMatch> = response
            .best_matches
            .into_iter()
            .map(StockMatch::from)
            .filter(StockMatch::is_canadian)
            .collect();
        matches.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        Ok(matches)
    }

    async fn intraday(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Vec<PricePoint>, QuoteSourceError> {
        let symbol = format_tsx_symbol(symbol);
        let mut body = self
            .fetch_value(Call {
                function: "TIME_SERIES_INTRADAY",
                params: vec![
                    ("symbol", symbol.as_str()),
                    ("interval", interval),
                    ("outputsize", "compact"),
                ],
                cache_key: format!("intraday_{symbol}_{interval}"),
                ttl: self.config.cache_ttl.intraday,
            })
            .await?;

        let series = take_series(&mut body, &format!("Time Series ({interval})"), "intraday")?;
        Ok(series_to_points(series, SeriesClock::Intraday))
    }

    async fn daily(&self, symbol: &str) -> Result<Vec<PricePoint>, QuoteSourceError> {
        let symbol = format_tsx_symbol(symbol);
        let mut body = self
            .fetch_value(Call {
                function: "TIME_SERIES_DAILY",
                params: vec![("symbol", symbol.as_str()), ("outputsize", "full")],
                cache_key: format!("daily_{symbol}_full"),
                ttl: self.config.cache_ttl.daily,
            })
            .await?;

        let series = take_series(&mut body, "Time Series (Daily)", "daily")?;
        Ok(series_to_points(series, SeriesClock::Daily))
    }
}

fn take_series(
    body: &mut serde_json::Value,
    key: &str,
    what: &str,
) -> Result<RawSeries, QuoteSourceError> {
    let Some(series) = body.get_mut(key).map(serde_json::Value::take) else {
        return Err(QuoteSourceError::NoData {
            what: what.to_string(),
        });
    };
    serde_json::from_value(series).map_err(|e| QuoteSourceError::Decode {
        message: e.to_string(),
    })
}
