//! Application Ports
//!
//! Interfaces the application layer depends on. Infrastructure adapters
//! implement them.
//!
//! - `QuoteSource`: probe + batch quotes, consumed by the realtime manager
//! - `StockDataPort`: raw REST operations, consumed by the market data service
//! - `NetworkStatus`: online/offline signal
//! - `KeyValueStore`: local persistence for the watchlist

mod key_value_store_port;
mod network_status_port;
mod quote_source_port;
mod stock_data_port;

pub use key_value_store_port::{KeyValueStore, StoreError};
pub use network_status_port::NetworkStatus;
pub use quote_source_port::{BatchQuotes, QuoteSource, QuoteSourceError};
#[cfg(test)]
pub use stock_data_port::MockStockDataPort;
pub use stock_data_port::StockDataPort;
