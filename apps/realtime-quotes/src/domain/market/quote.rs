//! Quote and search result types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::format::{format_currency, format_number, format_percentage};
use crate::domain::subscription::Symbol;

/// Latest quote for one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol as reported upstream (e.g. `SHOP.TO`).
    pub symbol: Symbol,
    /// Session open.
    pub open: Decimal,
    /// Session high.
    pub high: Decimal,
    /// Session low.
    pub low: Decimal,
    /// Last traded price.
    pub price: Decimal,
    /// Shares traded in the session.
    pub volume: u64,
    /// Trading day the quote belongs to.
    pub latest_trading_day: NaiveDate,
    /// Previous session close.
    pub previous_close: Decimal,
    /// Absolute change from the previous close.
    pub change: Decimal,
    /// Change in percent (`1.25` means +1.25%).
    pub change_percent: Decimal,
}

impl Quote {
    /// Price moved up from the previous close.
    #[must_use]
    pub fn is_gainer(&self) -> bool {
        self.change > Decimal::ZERO
    }

    /// Price moved down from the previous close.
    #[must_use]
    pub fn is_loser(&self) -> bool {
        self.change < Decimal::ZERO
    }

    /// Price as CAD currency, e.g. `$182.40`.
    #[must_use]
    pub fn formatted_price(&self) -> String {
        format_currency(self.price)
    }

    /// Change as CAD currency, e.g. `-$1.05`.
    #[must_use]
    pub fn formatted_change(&self) -> String {
        format_currency(self.change)
    }

    /// Change percent with sign, e.g. `+0.58%`.
    #[must_use]
    pub fn formatted_change_percent(&self) -> String {
        format_percentage(self.change_percent)
    }

    /// Compact volume, e.g. `1.2M`.
    #[must_use]
    pub fn formatted_volume(&self) -> String {
        format_number(self.volume)
    }
}

/// A listing returned by symbol search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMatch {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Company name.
    pub name: String,
    /// Instrument type, e.g. `Equity`.
    pub kind: String,
    /// Listing region, e.g. `Canada`.
    pub region: String,
    /// Local market open time, if reported.
    pub market_open: Option<String>,
    /// Local market close time, if reported.
    pub market_close: Option<String>,
    /// Listing time zone, if reported.
    pub timezone: Option<String>,
    /// Trading currency.
    pub currency: String,
    /// Relevance score in `0.0..=1.0`.
    pub match_score: f64,
}

impl StockMatch {
    /// True for TSX, TSX Venture and CSE listings.
    #[must_use]
    pub fn is_canadian(&self) -> bool {
        self.region == "Canada"
            || self.symbol.contains(".TO")
            || self.symbol.contains(".V")
            || self.symbol.contains(".CN")
    }
}

/// A well-known TSX listing used to seed short searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopularStock {
    /// Ticker symbol.
    pub symbol: &'static str,
    /// Company name.
    pub name: &'static str,
}

impl PopularStock {
    /// Case-insensitive substring match on symbol or name.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.symbol.to_lowercase().contains(&query) || self.name.to_lowercase().contains(&query)
    }

    /// Render as a search result.
    #[must_use]
    pub fn to_match(&self) -> StockMatch {
        StockMatch {
            symbol: self.symbol.to_string(),
            name: self.name.to_string(),
            kind: "Equity".to_string(),
            region: "Canada".to_string(),
            market_open: None,
            market_close: None,
            timezone: None,
            currency: "CAD".to_string(),
            match_score: 0.9,
        }
    }
}

/// Large-cap TSX names offered for one and two character searches.
pub const POPULAR_TSX_STOCKS: [PopularStock; 15] = [
    PopularStock { symbol: "SHOP.TO", name: "Shopify Inc." },
    PopularStock { symbol: "RY.TO", name: "Royal Bank of Canada" },
    PopularStock { symbol: "TD.TO", name: "The Toronto-Dominion Bank" },
    PopularStock { symbol: "BMO.TO", name: "Bank of Montreal" },
    PopularStock { symbol: "BNS.TO", name: "The Bank of Nova Scotia" },
    PopularStock { symbol: "CNR.TO", name: "Canadian National Railway Company" },
    PopularStock { symbol: "CP.TO", name: "Canadian Pacific Kansas City Limited" },
    PopularStock { symbol: "ENB.TO", name: "Enbridge Inc." },
    PopularStock { symbol: "TRP.TO", name: "TC Energy Corporation" },
    PopularStock { symbol: "WCN.TO", name: "Waste Connections, Inc." },
    PopularStock { symbol: "CNQ.TO", name: "Canadian Natural Resources Limited" },
    PopularStock { symbol: "SU.TO", name: "Suncor Energy Inc." },
    PopularStock { symbol: "IMO.TO", name: "Imperial Oil Limited" },
    PopularStock { symbol: "CVE.TO", name: "Cenovus Energy Inc." },
    PopularStock { symbol: "ATD.TO", name: "Alimentation Couche-Tard Inc." },
];

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(change: Decimal) -> Quote {
        Quote {
            symbol: "SHOP.TO".to_string(),
            open: dec!(100.00),
            high: dec!(105.00),
            low: dec!(99.50),
            price: dec!(1234.5),
            volume: 1_250_000,
            latest_trading_day: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            previous_close: dec!(100.00),
            change,
            change_percent: dec!(1.5),
        }
    }

    #[test]
    fn gainer_and_loser_follow_change_sign() {
        assert!(quote(dec!(1.5)).is_gainer());
        assert!(!quote(dec!(1.5)).is_loser());
        assert!(quote(dec!(-0.01)).is_loser());

        let flat = quote(Decimal::ZERO);
        assert!(!flat.is_gainer());
        assert!(!flat.is_loser());
    }

    #[test]
    fn formatted_fields() {
        let q = quote(dec!(-1.05));
        assert_eq!(q.formatted_price(), "$1,234.50");
        assert_eq!(q.formatted_change(), "-$1.05");
        assert_eq!(q.formatted_change_percent(), "+1.50%");
        assert_eq!(q.formatted_volume(), "1.3M");
    }

    #[test]
    fn popular_stock_matches_symbol_or_name() {
        let ry = POPULAR_TSX_STOCKS[1];
        assert!(ry.matches("ry"));
        assert!(ry.matches("ROYAL"));
        assert!(!ry.matches("zz"));
    }

    #[test]
    fn canadian_listing_detection() {
        let mut m = POPULAR_TSX_STOCKS[0].to_match();
        assert!(m.is_canadian());

        m.region = "United States".to_string();
        m.symbol = "AAPL".to_string();
        assert!(!m.is_canadian());

        m.symbol = "ABC.V".to_string();
        assert!(m.is_canadian());
    }
}
