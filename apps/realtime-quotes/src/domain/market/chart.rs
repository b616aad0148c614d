//! Chart series and period filtering.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV bar. `time` is a Unix timestamp in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Bar start, Unix seconds.
    pub time: i64,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Volume traded in the bar.
    pub volume: u64,
}

/// Chart range selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChartPeriod {
    /// Intraday bars for the current session.
    #[default]
    #[serde(rename = "1D")]
    OneDay,
    /// Five days of daily bars.
    #[serde(rename = "5D")]
    FiveDays,
    /// Thirty days.
    #[serde(rename = "1M")]
    OneMonth,
    /// Ninety days.
    #[serde(rename = "3M")]
    ThreeMonths,
    /// 180 days.
    #[serde(rename = "6M")]
    SixMonths,
    /// 365 days.
    #[serde(rename = "1Y")]
    OneYear,
    /// Full history.
    #[serde(rename = "MAX")]
    Max,
}

impl ChartPeriod {
    /// Short code, e.g. `"3M"`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1D",
            Self::FiveDays => "5D",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::OneYear => "1Y",
            Self::Max => "MAX",
        }
    }

    /// How far back the period reaches. `None` means unbounded.
    #[must_use]
    pub const fn lookback_days(&self) -> Option<i64> {
        match self {
            Self::OneDay => Some(1),
            Self::FiveDays => Some(5),
            Self::OneMonth => Some(30),
            Self::ThreeMonths => Some(90),
            Self::SixMonths => Some(180),
            Self::OneYear => Some(365),
            Self::Max => None,
        }
    }

    /// True when the period is served from intraday bars.
    #[must_use]
    pub const fn is_intraday(&self) -> bool {
        matches!(self, Self::OneDay)
    }
}

/// Unknown chart period code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chart period: {0}")]
pub struct ParseChartPeriodError(pub String);

impl FromStr for ChartPeriod {
    type Err = ParseChartPeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "1D" => Ok(Self::OneDay),
            "5D" => Ok(Self::FiveDays),
            "1M" => Ok(Self::OneMonth),
            "3M" => Ok(Self::ThreeMonths),
            "6M" => Ok(Self::SixMonths),
            "1Y" => Ok(Self::OneYear),
            "MAX" => Ok(Self::Max),
            _ => Err(ParseChartPeriodError(s.to_string())),
        }
    }
}

/// Keep the points that fall inside `period`, measured back from `now`.
#[must_use]
pub fn filter_by_period(
    points: Vec<PricePoint>,
    period: ChartPeriod,
    now: DateTime<Utc>,
) -> Vec<PricePoint> {
    let Some(days) = period.lookback_days() else {
        return points;
    };
    let cutoff = (now - Duration::days(days)).timestamp();
    points.into_iter().filter(|p| p.time >= cutoff).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn point(time: i64) -> PricePoint {
        PricePoint {
            time,
            open: Decimal::ONE,
            high: Decimal::ONE,
            low: Decimal::ONE,
            close: Decimal::ONE,
            volume: 10,
        }
    }

    #[test_case("1D", ChartPeriod::OneDay)]
    #[test_case("5d", ChartPeriod::FiveDays)]
    #[test_case("1M", ChartPeriod::OneMonth)]
    #[test_case("3M", ChartPeriod::ThreeMonths)]
    #[test_case("6M", ChartPeriod::SixMonths)]
    #[test_case("1y", ChartPeriod::OneYear)]
    #[test_case("max", ChartPeriod::Max)]
    fn parses_codes(code: &str, expected: ChartPeriod) {
        assert_eq!(code.parse::<ChartPeriod>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_code() {
        assert!("2W".parse::<ChartPeriod>().is_err());
    }

    #[test]
    fn filter_keeps_points_inside_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 20, 0, 0).unwrap();
        let day = 86_400;
        let points = vec![
            point(now.timestamp() - 40 * day),
            point(now.timestamp() - 10 * day),
            point(now.timestamp() - day),
        ];

        let month = filter_by_period(points.clone(), ChartPeriod::OneMonth, now);
        assert_eq!(month.len(), 2);

        let five = filter_by_period(points.clone(), ChartPeriod::FiveDays, now);
        assert_eq!(five.len(), 1);

        let all = filter_by_period(points, ChartPeriod::Max, now);
        assert_eq!(all.len(), 3);
    }
}
