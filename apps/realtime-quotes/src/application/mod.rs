//! Application Layer
//!
//! Orchestrates domain logic behind ports:
//!
//! - **Ports**: interfaces for the quote backend, network signal and storage
//! - **Events**: the typed notifications the realtime manager emits
//! - **Services**: realtime manager, market data facade, watchlist

pub mod events;
pub mod ports;
pub mod services;

pub use events::*;
pub use ports::*;
