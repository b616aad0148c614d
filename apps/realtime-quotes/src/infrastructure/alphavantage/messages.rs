//! Alpha Vantage wire types.
//!
//! Every numeric field arrives as a string keyed by a numbered label
//! (`"05. price"`). These types mirror the payloads and convert into
//! domain values.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::America::Toronto;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::ports::QuoteSourceError;
use crate::domain::market::{PricePoint, Quote, StockMatch};

// =============================================================================
// Error Envelope
// =============================================================================

/// Notices Alpha Vantage returns with a 200 status.
#[derive(Debug, Default, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Error Message")]
    pub error_message: Option<String>,
    #[serde(rename = "Information")]
    pub information: Option<String>,
    #[serde(rename = "Note")]
    pub note: Option<String>,
}

impl Envelope {
    /// Map an in-band notice to an error, if present.
    pub fn into_error(self) -> Option<QuoteSourceError> {
        if let Some(message) = self.error_message {
            return Some(QuoteSourceError::Api {
                status: None,
                message,
            });
        }
        self.information
            .or(self.note)
            .map(|message| QuoteSourceError::RateLimited { message })
    }
}

// =============================================================================
// GLOBAL_QUOTE
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    pub global_quote: Option<RawGlobalQuote>,
}

/// Unknown symbols come back as an empty object, so every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct RawGlobalQuote {
    #[serde(rename = "01. symbol")]
    pub symbol: Option<String>,
    #[serde(rename = "02. open")]
    pub open: Option<String>,
    #[serde(rename = "03. high")]
    pub high: Option<String>,
    #[serde(rename = "04. low")]
    pub low: Option<String>,
    #[serde(rename = "05. price")]
    pub price: Option<String>,
    #[serde(rename = "06. volume")]
    pub volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    pub latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    pub previous_close: Option<String>,
    #[serde(rename = "09. change")]
    pub change: Option<String>,
    #[serde(rename = "10. change percent")]
    pub change_percent: Option<String>,
}

impl RawGlobalQuote {
    pub fn into_quote(self) -> Result<Quote, QuoteSourceError> {
        let Some(symbol) = self.symbol.filter(|s| !s.is_empty()) else {
            return Err(QuoteSourceError::NoData {
                what: "quote".to_string(),
            });
        };

        let change_percent = required("10. change percent", self.change_percent)?;
        let latest_trading_day = required("07. latest trading day", self.latest_trading_day)?;

        Ok(Quote {
            symbol,
            open: decimal("02. open", self.open)?,
            high: decimal("03. high", self.high)?,
            low: decimal("04. low", self.low)?,
            price: decimal("05. price", self.price)?,
            volume: integer("06. volume", self.volume)?,
            latest_trading_day: NaiveDate::parse_from_str(&latest_trading_day, "%Y-%m-%d")
                .map_err(|e| decode("07. latest trading day", &e))?,
            previous_close: decimal("08. previous close", self.previous_close)?,
            change: decimal("09. change", self.change)?,
            change_percent: decimal(
                "10. change percent",
                Some(change_percent.trim_end_matches('%').to_string()),
            )?,
        })
    }
}

// =============================================================================
// SYMBOL_SEARCH
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "bestMatches", default)]
    pub best_matches: Vec<RawSearchMatch>,
}

#[derive(Debug, Deserialize)]
pub struct RawSearchMatch {
    #[serde(rename = "1. symbol")]
    pub symbol: String,
    #[serde(rename = "2. name", default)]
    pub name: String,
    #[serde(rename = "3. type", default)]
    pub kind: String,
    #[serde(rename = "4. region", default)]
    pub region: String,
    #[serde(rename = "5. marketOpen")]
    pub market_open: Option<String>,
    #[serde(rename = "6. marketClose")]
    pub market_close: Option<String>,
    #[serde(rename = "7. timezone")]
    pub timezone: Option<String>,
    #[serde(rename = "8. currency", default)]
    pub currency: String,
    #[serde(rename = "9. matchScore", default)]
    pub match_score: String,
}

impl From<RawSearchMatch> for StockMatch {
    fn from(raw: RawSearchMatch) -> Self {
        Self {
            symbol: raw.symbol,
            name: raw.name,
            kind: raw.kind,
            region: raw.region,
            market_open: raw.market_open,
            market_close: raw.market_close,
            timezone: raw.timezone,
            currency: raw.currency,
            match_score: raw.match_score.parse().unwrap_or(0.0),
        }
    }
}

// =============================================================================
// TIME_SERIES_*
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RawBar {
    #[serde(rename = "1. open")]
    pub open: String,
    #[serde(rename = "2. high")]
    pub high: String,
    #[serde(rename = "3. low")]
    pub low: String,
    #[serde(rename = "4. close")]
    pub close: String,
    #[serde(rename = "5. volume")]
    pub volume: String,
}

pub type RawSeries = BTreeMap<String, RawBar>;

/// How series keys are turned into timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesClock {
    /// `YYYY-MM-DD HH:MM:SS`, exchange local time.
    Intraday,
    /// `YYYY-MM-DD`, taken as UTC midnight.
    Daily,
}

impl SeriesClock {
    fn timestamp(self, key: &str) -> Option<i64> {
        match self {
            Self::Intraday => {
                let local = NaiveDateTime::parse_from_str(key, "%Y-%m-%d %H:%M:%S").ok()?;
                Toronto
                    .from_local_datetime(&local)
                    .earliest()
                    .map(|t| t.timestamp())
            }
            Self::Daily => NaiveDate::parse_from_str(key, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
                .map(|t| t.and_utc().timestamp()),
        }
    }
}

/// Convert a series to points sorted oldest first. Unparseable rows are
/// dropped.
pub fn series_to_points(series: RawSeries, clock: SeriesClock) -> Vec<PricePoint> {
    let mut points: Vec<PricePoint> = series
        .into_iter()
        .filter_map(|(key, bar)| {
            let point = bar_to_point(&key, bar, clock);
            if point.is_none() {
                tracing::debug!(key = %key, "Dropping unparseable bar");
            }
            point
        })
        .collect();
    points.sort_by_key(|p| p.time);
    points
}

fn bar_to_point(key: &str, bar: RawBar, clock: SeriesClock) -> Option<PricePoint> {
    Some(PricePoint {
        time: clock.timestamp(key)?,
        open: Decimal::from_str(bar.open.trim()).ok()?,
        high: Decimal::from_str(bar.high.trim()).ok()?,
        low: Decimal::from_str(bar.low.trim()).ok()?,
        close: Decimal::from_str(bar.close.trim()).ok()?,
        volume: bar.volume.trim().parse().ok()?,
    })
}

// =============================================================================
// Field Helpers
// =============================================================================

fn decode(field: &str, err: &dyn std::fmt::Display) -> QuoteSourceError {
    QuoteSourceError::Decode {
        message: format!("{field}: {err}"),
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, QuoteSourceError> {
    value.ok_or_else(|| decode(field, &"missing"))
}

fn decimal(field: &str, value: Option<String>) -> Result<Decimal, QuoteSourceError> {
    let raw = required(field, value)?;
    Decimal::from_str(raw.trim()).map_err(|e| decode(field, &e))
}

fn integer(field: &str, value: Option<String>) -> Result<u64, QuoteSourceError> {
    let raw = required(field, value)?;
    raw.trim().parse().map_err(|e| decode(field, &e))
}
