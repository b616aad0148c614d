//! Configuration Module
//!
//! Service configuration loaded from environment variables.

mod settings;

pub use settings::{
    AlphaVantageSettings, ApiKey, ConfigError, NetworkSettings, RealtimeSettings, ServerSettings,
    ServiceConfig,
};
