//! Logging and Trace Export
//!
//! One global `tracing` subscriber: an `EnvFilter`, a fmt layer on stderr
//! and, when enabled, an OTLP span layer.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives, falling back to [`DEFAULT_DIRECTIVES`]
//! - `OTEL_ENABLED`: `true` turns on span export
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector address (`http://localhost:4317`)
//! - `OTEL_SERVICE_NAME`: resource name on exported spans (`realtime-quotes`)
//!
//! ```ignore
//! let _telemetry = realtime_quotes::init_telemetry()?;
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_DIRECTIVES: &str = "realtime_quotes=info,reqwest=warn,hyper=warn";

const SERVICE_NAME: &str = "realtime-quotes";
const COLLECTOR_ENDPOINT: &str = "http://localhost:4317";

/// Flushes pending spans on drop. Hold it for the life of `main`.
#[must_use = "dropping the guard stops span export"]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are being exported.
    #[must_use]
    pub const fn is_exporting(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        // The subscriber may already be gone here, so report on stderr.
        if let Err(error) = provider.shutdown() {
            eprintln!("span exporter did not flush cleanly: {error}");
        }
    }
}

/// Span export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Export spans over OTLP.
    pub enabled: bool,
    /// Collector gRPC endpoint.
    pub otlp_endpoint: String,
    /// `service.name` resource attribute.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: COLLECTOR_ENDPOINT.to_owned(),
            service_name: SERVICE_NAME.to_owned(),
        }
    }
}

impl TelemetryConfig {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; unset names keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(flag) = lookup("OTEL_ENABLED") {
            config.enabled = flag.trim().eq_ignore_ascii_case("true");
        }
        if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.otlp_endpoint = endpoint;
        }
        if let Some(name) = lookup("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }
        config
    }
}

/// Subscriber installation failures.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// OTLP exporter construction failed.
    #[error("OTLP exporter for {endpoint}: {reason}")]
    Exporter {
        /// Configured collector endpoint.
        endpoint: String,
        /// Builder error text.
        reason: String,
    },

    /// Another global subscriber is already set.
    #[error("tracing subscriber already installed: {0}")]
    Subscriber(String),
}

/// [`init_with_config`] with [`TelemetryConfig::from_env`].
///
/// # Errors
///
/// As [`init_with_config`].
pub fn init() -> Result<TelemetryGuard, TelemetryError> {
    init_with_config(TelemetryConfig::from_env())
}

/// Install the global subscriber.
///
/// # Errors
///
/// [`TelemetryError::Exporter`] when export is enabled and the exporter
/// cannot be built, [`TelemetryError::Subscriber`] when called twice.
pub fn init_with_config(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let provider = if config.enabled {
        Some(span_provider(&config)?)
    } else {
        None
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    let spans = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(spans)
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    if provider.is_some() {
        tracing::info!(endpoint = %config.otlp_endpoint, "Exporting spans over OTLP");
    }

    Ok(TelemetryGuard { provider })
}

fn span_provider(config: &TelemetryConfig) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.as_str())
        .build()
        .map_err(|e| TelemetryError::Exporter {
            endpoint: config.otlp_endpoint.clone(),
            reason: e.to_string(),
        })?;

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}
