//! Network Status Providers
//!
//! Implementations of [`NetworkStatus`](crate::application::ports::NetworkStatus):
//!
//! - [`ManualNetworkStatus`]: flipped by the host application or tests
//! - [`TcpReachabilityMonitor`]: periodically dials a `host:port`

mod manual;
mod tcp;

pub use manual::ManualNetworkStatus;
pub use tcp::TcpReachabilityMonitor;
