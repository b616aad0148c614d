//! Application Services
//!
//! Long-running coordination (the realtime manager and its event bus) plus
//! the request/response facades the UI layer calls directly.

pub mod event_bus;
mod market_data;
pub mod realtime;
mod watchlist;

pub use event_bus::{EventBus, ListenerHandle, ListenerId};
pub use market_data::{DEFAULT_BATCH_DELAY, MarketDataService};
pub use realtime::{RealtimeConfig, RealtimeDataService, SyncError};
pub use watchlist::{WATCHLIST_KEY, Watchlist};
