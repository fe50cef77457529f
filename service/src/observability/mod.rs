use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use tracing::warn;

pub mod propagators;

pub const SERVICE_NAME: &str = "asset-store";

/// Installs the global tracer provider and the W3C trace-context propagator.
/// Spans are only exported when `export_to_stdout` is set; otherwise they
/// still carry ids for log correlation and propagation.
pub fn tracer_provider_setup(export_to_stdout: bool) -> TracerProvider {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let builder = TracerProvider::builder();
    let provider = if export_to_stdout {
        builder
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build()
    } else {
        builder.build()
    };

    global::set_tracer_provider(provider.clone());
    provider
}

pub fn tracer_provider_shutdown(provider: TracerProvider) {
    if let Err(e) = provider.shutdown() {
        warn!("Tracer provider did not shut down cleanly: {e}");
    }
}
