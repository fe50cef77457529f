use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::observability::SERVICE_NAME;

const DEFAULT_DIRECTIVES: &str = "info";

/// JSON logs on stdout in the Cloud Logging shape, filtered by `RUST_LOG`,
/// with every span also handed to OpenTelemetry.
pub fn logger_setup(provider: &TracerProvider) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let telemetry = tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME));

    tracing_subscriber::registry()
        .with(filter)
        .with(telemetry)
        .with(tracing_stackdriver::layer())
        .try_init()
}
