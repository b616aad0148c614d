//! TSX trading session derived from the Toronto wall clock.
//!
//! Regular hours are 09:30 to 16:00 Eastern, Monday through Friday.
//! Exchange holidays are not modelled.

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::America::Toronto;
use serde::Serialize;

/// Which part of the trading day it is in Toronto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TsxSession {
    /// Before 09:30 on a weekday.
    PreMarket,
    /// Regular session.
    Open,
    /// At or after 16:00 on a weekday.
    AfterHours,
    /// Saturday or Sunday.
    ClosedWeekend,
}

impl TsxSession {
    /// Human readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::PreMarket => "Pre-Market",
            Self::Open => "Open",
            Self::AfterHours => "After Hours",
            Self::ClosedWeekend => "Closed (Weekend)",
        }
    }
}

/// Market status reported by the probe and heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketStatus {
    /// True during the regular session.
    pub is_open: bool,
    /// Current session.
    pub session: TsxSession,
    /// Instant the status was computed for.
    pub as_of: DateTime<Utc>,
}

impl MarketStatus {
    /// Compute the session for a given instant.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(&Toronto);
        let session = if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            TsxSession::ClosedWeekend
        } else {
            let time = NaiveTime::from_hms_opt(local.hour(), local.minute(), 0)
                .unwrap_or(NaiveTime::MIN);
            let open = NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN);
            let close = NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN);
            if time < open {
                TsxSession::PreMarket
            } else if time < close {
                TsxSession::Open
            } else {
                TsxSession::AfterHours
            }
        };

        Self {
            is_open: session == TsxSession::Open,
            session,
            as_of: now,
        }
    }

    /// Status for the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    // 2026-03-04 is a Wednesday; Toronto is on EST (UTC-5) until March 8.
    #[test_case(2026, 3, 4, 14, 29, TsxSession::PreMarket ; "09:29 local")]
    #[test_case(2026, 3, 4, 14, 30, TsxSession::Open ; "09:30 local")]
    #[test_case(2026, 3, 4, 20, 59, TsxSession::Open ; "15:59 local")]
    #[test_case(2026, 3, 4, 21, 0, TsxSession::AfterHours ; "16:00 local")]
    #[test_case(2026, 3, 7, 15, 0, TsxSession::ClosedWeekend ; "saturday")]
    #[test_case(2026, 3, 8, 15, 0, TsxSession::ClosedWeekend ; "sunday")]
    fn session_at(y: i32, m: u32, d: u32, h: u32, min: u32, expected: TsxSession) {
        let now = Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap();
        let status = MarketStatus::at(now);
        assert_eq!(status.session, expected);
        assert_eq!(status.is_open, expected == TsxSession::Open);
    }

    #[test]
    fn respects_daylight_saving() {
        // 2026-07-15 is a Wednesday on EDT (UTC-4): 13:30 UTC is 09:30 local.
        let now = Utc.with_ymd_and_hms(2026, 7, 15, 13, 30, 0).unwrap();
        assert_eq!(MarketStatus::at(now).session, TsxSession::Open);
    }

    #[test]
    fn labels() {
        assert_eq!(TsxSession::ClosedWeekend.label(), "Closed (Weekend)");
        assert_eq!(TsxSession::PreMarket.label(), "Pre-Market");
    }
}
