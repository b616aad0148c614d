//! Domain Layer - Core quote types and connection state.
//!
//! Pure data types with no I/O: symbols and the subscription set, the
//! connection state machine's states, and market data values.

/// Logical connection state and snapshots.
pub mod connection;

/// Quotes, chart bars, TSX session and formatting.
pub mod market;

/// Symbol normalization and the subscription set.
pub mod subscription;
