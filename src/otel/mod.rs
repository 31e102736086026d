//! OpenTelemetry integration for galle-bouncer
//!
//! Structured logging setup plus optional OTLP export of traces and of the
//! push/connect metrics.

use crate::config::{LogFormat, LogLevel, OtelConfig};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    trace::TracerProvider as TracerProviderTrait,
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::TracerProvider, Resource};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// OpenTelemetry error types
#[derive(Debug, Error)]
pub enum OtelError {
    /// Failed to initialize tracer
    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Failed to initialize meter
    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    /// Failed to shutdown
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// OpenTelemetry provider
///
/// Exports over OTLP when enabled, otherwise keeps an in-process meter
/// provider so instruments can always be created.
pub struct OtelProvider {
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
    config: OtelConfig,
}

impl OtelProvider {
    /// Create a new OtelProvider with the given configuration
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let (tracer_provider, meter_provider) = if config.enabled {
            let endpoint = config.endpoint.as_ref().ok_or_else(|| {
                OtelError::Config("OTLP endpoint is required when enabled".into())
            })?;

            let tracer_provider = Self::init_tracer_provider(endpoint, &resource)?;

            let meter_provider = Self::init_meter_provider(endpoint, &resource)?;

            (Some(tracer_provider), meter_provider)
        } else {
            let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
            (None, meter_provider)
        };

        // Set global tracer provider
        if let Some(ref tp) = tracer_provider {
            global::set_tracer_provider(tp.clone());
        }

        Ok(Self {
            tracer_provider,
            meter_provider,
            config: config.clone(),
        })
    }

    /// Initialize the tracer provider with OTLP exporter
    fn init_tracer_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<TracerProvider, OtelError> {
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::runtime;
        use opentelemetry_sdk::trace::{Config, Sampler};

        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .build_span_exporter()
            .map_err(|e| OtelError::TracerInit(e.to_string()))?;

        let trace_config = Config::default()
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(resource.clone());

        let tracer_provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(trace_config)
            .build();

        Ok(tracer_provider)
    }

    /// Initialize the meter provider with OTLP exporter
    fn init_meter_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<SdkMeterProvider, OtelError> {
        use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
        use opentelemetry_sdk::metrics::reader::{
            DefaultAggregationSelector, DefaultTemporalitySelector,
        };
        use opentelemetry_sdk::{metrics::PeriodicReader, runtime};

        let exporter = MetricsExporterBuilder::from(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .build_metrics_exporter(
            Box::new(DefaultTemporalitySelector::new()),
            Box::new(DefaultAggregationSelector::new()),
        )
        .map_err(|e| OtelError::MeterInit(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter, runtime::Tokio).build();

        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(reader)
            .build();

        Ok(meter_provider)
    }

    /// Get a tracer from the provider, `None` when export is disabled
    pub fn tracer(&self, name: &'static str) -> Option<opentelemetry_sdk::trace::Tracer> {
        self.tracer_provider.as_ref().map(|tp| tp.tracer(name))
    }

    /// Get the meter for creating metrics
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.config.service_name.clone())
    }

    /// Check if OpenTelemetry is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Shutdown the OpenTelemetry providers gracefully
    pub fn shutdown(&self) -> Result<(), OtelError> {
        // Shutdown meter provider
        if let Err(e) = self.meter_provider.shutdown() {
            return Err(OtelError::Shutdown(format!(
                "Meter shutdown failed: {:?}",
                e
            )));
        }

        // Force flush any remaining spans
        if let Some(ref tp) = self.tracer_provider {
            for result in tp.force_flush() {
                if let Err(e) = result {
                    return Err(OtelError::Shutdown(format!("Tracer flush failed: {:?}", e)));
                }
            }
        }

        Ok(())
    }
}

impl Drop for OtelProvider {
    fn drop(&mut self) {
        // Best-effort shutdown on drop
        let _ = self.shutdown();
    }
}

/// Push outcome label values
pub mod outcome {
    pub const SUCCESS: &str = "success";
    pub const CONNECTION_ERROR: &str = "connection_error";
    pub const STATUS_ERROR: &str = "status_error";
    pub const FORBIDDEN: &str = "forbidden";
    pub const TIMEOUT: &str = "timeout";
    pub const ERROR: &str = "error";
}

/// Application metrics
#[derive(Clone)]
pub struct Metrics {
    /// Ban list pushes, by outcome
    pub pushes_total: Counter<u64>,

    /// Size of each pushed ban list
    pub decisions_pushed: Histogram<u64>,

    /// Upstream connection attempts at startup, by outcome
    pub upstream_connect_attempts_total: Counter<u64>,
}

impl Metrics {
    /// Create new metrics with the given meter
    pub fn new(meter: &Meter) -> Self {
        let pushes_total = meter
            .u64_counter("galle_bouncer_pushes_total")
            .with_description("Total number of ban list pushes")
            .init();

        let decisions_pushed = meter
            .u64_histogram("galle_bouncer_decisions_pushed")
            .with_description("Number of banned IPs in each successful push")
            .init();

        let upstream_connect_attempts_total = meter
            .u64_counter("galle_bouncer_upstream_connect_attempts_total")
            .with_description("Total number of CrowdSec connection attempts")
            .init();

        Self {
            pushes_total,
            decisions_pushed,
            upstream_connect_attempts_total,
        }
    }

    /// Record a push with its outcome
    pub fn record_push(&self, outcome: &str) {
        self.pushes_total
            .add(1, &[KeyValue::new("outcome", outcome.to_string())]);
    }

    /// Record the size of a pushed ban list
    pub fn record_decisions(&self, count: usize) {
        self.decisions_pushed.record(count as u64, &[]);
    }

    /// Record an upstream connection attempt
    pub fn record_connect_attempt(&self, outcome: &str) {
        self.upstream_connect_attempts_total
            .add(1, &[KeyValue::new("outcome", outcome.to_string())]);
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

/// Initialize tracing subscriber with OpenTelemetry integration
pub fn init_tracing(
    otel: &OtelProvider,
    log_level: LogLevel,
    format: LogFormat,
) -> Result<(), OtelError> {
    let filter = tracing_subscriber::filter::LevelFilter::from_level(log_level.as_tracing_level());

    let otel_layer = otel
        .tracer("galle-bouncer")
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let fmt_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| OtelError::TracerInit(e.to_string()))
}
