use crate::config::Environment;
use opentelemetry::global;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Pretty output in development, JSON in production. Filtering follows
/// `RUST_LOG` and defaults to `info`. Spans are bridged to the global
/// OpenTelemetry tracer, which is a no-op until a [`crate::TelemetryGuard`]
/// has been initialized.
///
/// Returns an error if a subscriber is already installed.
pub fn setup_logging(service_name: &str, environment: Environment) -> anyhow::Result<()> {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(global::tracer(service_name.to_string()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init()?,
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .try_init()?,
    }

    Ok(())
}
