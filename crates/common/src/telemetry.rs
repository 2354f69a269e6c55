use opentelemetry::global;
use opentelemetry::trace::TraceError;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TelemetryConfig;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Failed to start Jaeger exporter: {0}")]
    Exporter(#[from] TraceError),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Install the process-wide subscriber for `service_name`.
///
/// Events are written as JSON lines filtered by `config.log_filter`. Spans go
/// to the Jaeger agent as well when one is configured.
pub fn init_telemetry(service_name: &str, config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_filter)?;

    let span_export = match &config.jaeger_agent {
        Some(agent) => {
            global::set_text_map_propagator(TraceContextPropagator::new());
            let tracer = opentelemetry_jaeger::new_agent_pipeline()
                .with_service_name(service_name)
                .with_endpoint(agent.as_str())
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json().with_thread_ids(true))
        .with(span_export)
        .try_init()?;

    tracing::info!(
        service = service_name,
        jaeger_agent = config.jaeger_agent.as_deref().unwrap_or("none"),
        "Telemetry initialized"
    );
    Ok(())
}

/// Flush pending spans and shut the tracer provider down
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
