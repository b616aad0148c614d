//! Market Data Types
//!
//! Quotes, search results, chart bars and the TSX session clock, plus the
//! display formatting shared by all of them.

mod chart;
mod format;
mod quote;
mod session;

pub use chart::{ChartPeriod, ParseChartPeriodError, PricePoint, filter_by_period};
pub use format::{format_currency, format_number, format_percentage};
pub use quote::{POPULAR_TSX_STOCKS, PopularStock, Quote, StockMatch};
pub use session::{MarketStatus, TsxSession};
