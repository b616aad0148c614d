//! Alpha Vantage Adapter
//!
//! REST client for the Alpha Vantage query API implementing
//! [`StockDataPort`](crate::application::ports::StockDataPort).
//!
//! # Behaviour
//!
//! - Bare tickers are taken as TSX listings (`SHOP` becomes `SHOP.TO`)
//! - Responses are cached per request with a per-kind TTL
//! - Upstream calls are spaced to respect the free tier quota
//! - In-band notices (`Error Message`, `Information`, `Note`) become errors
//! - Search results are limited to Canadian listings, best match first

mod cache;
mod client;
mod messages;

pub use cache::CacheTtl;
pub use client::{AlphaVantageClient, AlphaVantageConfig, DEFAULT_BASE_URL, format_tsx_symbol};
