use crate::config::env_or;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};
use std::time::Duration;

/// Where and how often to ship spans and metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub endpoint: String,
    pub metric_interval: Duration,
    /// Fraction of root traces kept, in `[0, 1]`.
    pub sample_ratio: f64,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            endpoint: endpoint.into(),
            metric_interval: Duration::from_secs(10),
            sample_ratio: 1.0,
        }
    }

    /// `OTEL_METRIC_INTERVAL_SECS` and `OTEL_SAMPLE_RATIO` override the defaults.
    pub fn from_env(service_name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let defaults = Self::new(service_name, endpoint);
        Self {
            metric_interval: Duration::from_secs(env_or("OTEL_METRIC_INTERVAL_SECS", 10u64).max(1)),
            sample_ratio: env_or("OTEL_SAMPLE_RATIO", defaults.sample_ratio).clamp(0.0, 1.0),
            ..defaults
        }
    }

    fn resource(&self) -> Resource {
        Resource::builder()
            .with_attributes([
                KeyValue::new(SERVICE_NAME, self.service_name.clone()),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            ])
            .build()
    }
}

/// Owns the global OTLP tracer and meter providers; flushes them on drop.
///
/// Create it before [`crate::setup_logging`] so the tracing bridge exports
/// through the real tracer rather than the no-op one.
pub struct TelemetryGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl TelemetryGuard {
    pub fn init(config: &TelemetryConfig) -> anyhow::Result<Self> {
        global::set_text_map_propagator(TraceContextPropagator::new());
        let resource = config.resource();

        let spans = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&config.endpoint)
            .build()?;
        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                config.sample_ratio,
            ))))
            .with_batch_exporter(spans)
            .build();

        let metrics = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(&config.endpoint)
            .build()?;
        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(
                PeriodicReader::builder(metrics)
                    .with_interval(config.metric_interval)
                    .build(),
            )
            .build();

        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());

        tracing::info!(
            service = %config.service_name,
            endpoint = %config.endpoint,
            sample_ratio = config.sample_ratio,
            "Telemetry export enabled"
        );
        Ok(Self {
            tracer_provider,
            meter_provider,
        })
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // The subscriber may already be gone at this point.
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("tracer provider shutdown: {}", e);
        }
        if let Err(e) = self.meter_provider.shutdown() {
            eprintln!("meter provider shutdown: {}", e);
        }
    }
}

/// Enter an info-level span for the rest of the enclosing scope.
#[macro_export]
macro_rules! span {
    ($name:literal) => {
        tracing::info_span!($name).entered()
    };
    ($name:literal, $($fields:tt)+) => {
        tracing::info_span!($name, $($fields)+).entered()
    };
}
