//! OpenTelemetry observability configuration and initialization
//!
//! The client logs through `tracing` everywhere; this module decides where
//! those records go. With only logs enabled it installs a JSON `fmt`
//! subscriber filtered by `RUST_LOG`, so a DDP client run from a terminal
//! prints its lifecycle (`connecting`, `handshake sent`, `connection closed`)
//! without any collector around. Traces and metrics add OTLP exporters
//! pointed at `otlp_endpoint`.
//!
//! ```rust,no_run
//! use ddp_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("meteor-watcher")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("ddp_client=debug,info");
//!
//!     ddp_core::init_observability(config).expect("Failed to init observability");
//!
//!     // ... run the client ...
//!
//!     ddp_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint
//! - `RUST_LOG`: Log level filter (takes precedence over `log_level`)

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Interval at which metrics are pushed to the collector
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

type InitResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Observability configuration for OpenTelemetry
///
/// Defaults: service name `"ddp"`, the crate version, the OTLP endpoint from
/// `OTEL_EXPORTER_OTLP_ENDPOINT` (or `http://localhost:4317`), all pillars
/// enabled, and the log level from `RUST_LOG` (or `"info"`).
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to every span and metric
    pub service_name: String,
    pub service_version: String,
    /// gRPC endpoint of the OTLP collector
    pub otlp_endpoint: String,
    pub enable_traces: bool,
    pub enable_metrics: bool,
    pub enable_logs: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "ddp".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Create a configuration with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    /// Resource identifying this service in telemetry backends
    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Providers installed by `init_observability`, kept for shutdown
struct Installed {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
}

static INSTALLED: Mutex<Option<Installed>> = Mutex::new(None);

/// Initialize tracing and OpenTelemetry with the given configuration
///
/// Call once at startup; global providers and the global subscriber can only
/// be installed once per process.
pub fn init_observability(config: ObservabilityConfig) -> InitResult<()> {
    let tracer_provider = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };
    let meter_provider = if config.enable_metrics {
        Some(init_metrics(&config)?)
    } else {
        None
    };

    // The telemetry layer needs the tracer before the subscriber exists
    let tracer = tracer_provider
        .as_ref()
        .map(|provider| provider.tracer(config.service_name.clone()));
    init_tracing_subscriber(&config, tracer)?;

    if let Ok(mut installed) = INSTALLED.lock() {
        *installed = Some(Installed {
            tracer: tracer_provider,
            meter: meter_provider,
        });
    }

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        logs = config.enable_logs,
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer(config: &ObservabilityConfig) -> InitResult<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    global::set_tracer_provider(provider.clone());
    Ok(provider)
}

fn init_metrics(config: &ObservabilityConfig) -> InitResult<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider.clone());
    Ok(provider)
}

/// Install the global subscriber: `RUST_LOG` filter, optional OpenTelemetry
/// span export, and JSON log lines when logs are enabled
fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> InitResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let telemetry = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));
    let json_lines = config.enable_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .json()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry)
        .with(json_lines)
        .try_init()?;

    Ok(())
}

/// Flush pending spans and metrics and shut the providers down
///
/// Safe to call more than once, or without a prior `init_observability`.
pub fn shutdown_observability() {
    let installed = INSTALLED.lock().ok().and_then(|mut slot| slot.take());
    let Some(installed) = installed else {
        return;
    };

    tracing::info!("Shutting down observability");
    if let Some(provider) = installed.tracer {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Failed to shut down tracer provider");
        }
    }
    if let Some(provider) = installed.meter {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Failed to shut down meter provider");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "ddp");
        assert!(config.enable_traces);
        assert!(config.enable_metrics);
        assert!(config.enable_logs);
    }

    #[test]
    fn test_custom_config() {
        let config = ObservabilityConfig::new("meteor-watcher")
            .with_endpoint("http://custom:4317")
            .with_log_level("debug")
            .with_version("1.0.0")
            .with_traces(false);

        assert_eq!(config.service_name, "meteor-watcher");
        assert_eq!(config.otlp_endpoint, "http://custom:4317");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_version, "1.0.0");
        assert!(!config.enable_traces);
    }

    #[test]
    fn test_init_all_disabled() {
        let config = ObservabilityConfig::new("ddp-test")
            .with_traces(false)
            .with_metrics(false)
            .with_logs(false);

        // Only the `RUST_LOG` filter is installed; nothing to shut down
        assert!(init_observability(config).is_ok());
        shutdown_observability();
    }

    #[test]
    fn test_shutdown_idempotent() {
        shutdown_observability();
        shutdown_observability();
    }
}
