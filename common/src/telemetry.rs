//! Provides helper functions for initializing telemetry collection and publication.
use std::time::Duration;

use anyhow::Result;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{metrics::MeterProvider, runtime, trace, Resource};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter, Registry};

fn resource() -> Resource {
    Resource::new(vec![
        KeyValue::new(
            "hostname",
            gethostname::gethostname()
                .into_string()
                .expect("hostname should be valid utf-8"),
        ),
        KeyValue::new("service.name", "kubench"),
    ])
}

/// Initialize tracing and metrics.
///
/// Returns the meter provider so the caller can flush and shut it down at
/// process exit.
pub async fn init(otlp_endpoint: String) -> Result<MeterProvider> {
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(otlp_endpoint.clone()),
        )
        .with_trace_config(trace::config().with_resource(resource()))
        .install_batch(runtime::Tokio)?;

    let meter_provider = opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(otlp_endpoint),
        )
        .with_resource(resource())
        .with_period(Duration::from_secs(10))
        .build()?;
    opentelemetry::global::set_meter_provider(meter_provider.clone());

    // Setup filters
    // Default to INFO if no env is specified
    let log_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let otlp_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    // Setup tracing layers
    let telemetry = tracing_opentelemetry::layer()
        .with_tracer(tracer)
        .with_filter(otlp_filter);
    let logger = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .compact()
        .with_filter(log_filter);

    let collector = Registry::default().with(telemetry).with(logger);

    #[cfg(feature = "tokio-console")]
    let collector = {
        let console_filter = EnvFilter::builder().parse("tokio=trace,runtime=trace")?;
        let console_layer = console_subscriber::spawn().with_filter(console_filter);
        collector.with(console_layer)
    };

    // Initialize tracing
    tracing::subscriber::set_global_default(collector)?;

    Ok(meter_provider)
}
