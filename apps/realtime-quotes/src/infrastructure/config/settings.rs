//! Service Configuration Settings
//!
//! Configuration types for the quotes service, loaded from environment
//! variables. Unset variables fall back to defaults; set but unparseable
//! ones are an error.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::application::services::realtime::{RealtimeConfig, ReconnectConfig};
use crate::infrastructure::alphavantage::{AlphaVantageConfig, CacheTtl, DEFAULT_BASE_URL};

/// Alpha Vantage API key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key. Blank input yields `None`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// The raw key, for building requests.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Upstream API settings.
#[derive(Debug, Clone)]
pub struct AlphaVantageSettings {
    /// API key; without it every data call fails.
    pub api_key: Option<ApiKey>,
    /// Query endpoint.
    pub base_url: String,
    /// Minimum spacing between upstream calls.
    pub min_request_interval: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Pause between the symbols of a batch.
    pub batch_delay: Duration,
}

impl Default for AlphaVantageSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            min_request_interval: Duration::from_millis(12_000),
            request_timeout: Duration::from_secs(10),
            batch_delay: Duration::from_millis(100),
        }
    }
}

/// Realtime manager timing.
#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    /// Quote refresh period.
    pub refresh_interval: Duration,
    /// Heartbeat period.
    pub heartbeat_interval: Duration,
    /// First backoff delay.
    pub reconnect_base: Duration,
    /// Backoff attempts before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(60),
            reconnect_base: Duration::from_millis(1_000),
            max_reconnect_attempts: 5,
        }
    }
}

/// Reachability monitor settings.
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    /// `host:port` dialled to decide whether the host is online.
    pub probe_addr: String,
    /// Period between probes.
    pub probe_interval: Duration,
    /// Timeout of one probe.
    pub probe_timeout: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            probe_addr: "www.alphavantage.co:443".to_string(),
            probe_interval: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upstream API settings.
    pub alpha_vantage: AlphaVantageSettings,
    /// Realtime manager timing.
    pub realtime: RealtimeSettings,
    /// Reachability monitor settings.
    pub network: NetworkSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Watchlist file.
    pub watchlist_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            alpha_vantage: AlphaVantageSettings::default(),
            realtime: RealtimeSettings::default(),
            network: NetworkSettings::default(),
            server: ServerSettings::default(),
            watchlist_path: PathBuf::from("watchlist.json"),
        }
    }
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let av_defaults = AlphaVantageSettings::default();
        let alpha_vantage = AlphaVantageSettings {
            api_key: lookup("ALPHA_VANTAGE_API_KEY").and_then(ApiKey::new),
            base_url: lookup("ALPHA_VANTAGE_BASE_URL").unwrap_or(av_defaults.base_url),
            min_request_interval: parse_millis(
                &lookup,
                "QUOTES_RATE_LIMIT_MS",
                av_defaults.min_request_interval,
            )?,
            request_timeout: parse_secs(
                &lookup,
                "QUOTES_REQUEST_TIMEOUT_SECS",
                av_defaults.request_timeout,
            )?,
            batch_delay: parse_millis(&lookup, "QUOTES_BATCH_DELAY_MS", av_defaults.batch_delay)?,
        };

        let rt_defaults = RealtimeSettings::default();
        let realtime = RealtimeSettings {
            refresh_interval: non_zero(
                "QUOTES_REFRESH_INTERVAL_SECS",
                parse_secs(&lookup, "QUOTES_REFRESH_INTERVAL_SECS", rt_defaults.refresh_interval)?,
            )?,
            heartbeat_interval: non_zero(
                "QUOTES_HEARTBEAT_INTERVAL_SECS",
                parse_secs(
                    &lookup,
                    "QUOTES_HEARTBEAT_INTERVAL_SECS",
                    rt_defaults.heartbeat_interval,
                )?,
            )?,
            reconnect_base: parse_millis(
                &lookup,
                "QUOTES_RECONNECT_BASE_MS",
                rt_defaults.reconnect_base,
            )?,
            max_reconnect_attempts: parse_or(
                &lookup,
                "QUOTES_MAX_RECONNECT_ATTEMPTS",
                rt_defaults.max_reconnect_attempts,
            )?,
        };

        let net_defaults = NetworkSettings::default();
        let network = NetworkSettings {
            probe_addr: lookup("QUOTES_NETWORK_PROBE_ADDR").unwrap_or(net_defaults.probe_addr),
            probe_interval: non_zero(
                "QUOTES_NETWORK_PROBE_INTERVAL_SECS",
                parse_secs(
                    &lookup,
                    "QUOTES_NETWORK_PROBE_INTERVAL_SECS",
                    net_defaults.probe_interval,
                )?,
            )?,
            probe_timeout: net_defaults.probe_timeout,
        };

        let server = ServerSettings {
            health_port: parse_or(
                &lookup,
                "QUOTES_HEALTH_PORT",
                ServerSettings::default().health_port,
            )?,
        };

        let watchlist_path = lookup("QUOTES_WATCHLIST_PATH")
            .map_or_else(|| Self::default().watchlist_path, PathBuf::from);

        Ok(Self {
            alpha_vantage,
            realtime,
            network,
            server,
            watchlist_path,
        })
    }

    /// Alpha Vantage client configuration.
    #[must_use]
    pub fn alpha_vantage_config(&self) -> AlphaVantageConfig {
        AlphaVantageConfig {
            base_url: self.alpha_vantage.base_url.clone(),
            api_key: self.alpha_vantage.api_key.clone(),
            min_request_interval: self.alpha_vantage.min_request_interval,
            request_timeout: self.alpha_vantage.request_timeout,
            cache_ttl: CacheTtl::default(),
        }
    }

    /// Batch spacing for the market data service.
    #[must_use]
    pub const fn batch_delay(&self) -> Duration {
        self.alpha_vantage.batch_delay
    }
}

impl From<&ServiceConfig> for RealtimeConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            refresh_interval: config.realtime.refresh_interval,
            heartbeat_interval: config.realtime.heartbeat_interval,
            reconnect: ReconnectConfig::with_base(
                config.realtime.reconnect_base,
                config.realtime.max_reconnect_attempts,
            ),
            ..Self::default()
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },

    /// Environment variable must be greater than zero.
    #[error("{0} must be greater than zero")]
    Zero(String),
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let default = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(lookup, key, default).map(Duration::from_millis)
}

fn non_zero(key: &str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        Err(ConfigError::Zero(key.to_string()))
    } else {
        Ok(value)
    }
}
