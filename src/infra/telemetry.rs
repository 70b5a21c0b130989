//! Logging and metrics bootstrap.

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

/// Install the process-wide tracing subscriber and register metric
/// descriptions. Call once at startup, before anything logs.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let installed = match logging.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    };
    installed.map_err(|err| InfraError::telemetry(err.to_string()))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "scatto_cache_hit_total",
        Unit::Count,
        "Total number of response-cache hits."
    );
    describe_counter!(
        "scatto_cache_miss_total",
        Unit::Count,
        "Total number of response-cache misses."
    );
    describe_counter!(
        "scatto_cache_invalidate_total",
        Unit::Count,
        "Total number of whole-cache invalidation passes."
    );
    describe_counter!(
        "scatto_notify_publish_total",
        Unit::Count,
        "Total number of published change notifications."
    );
    describe_counter!(
        "scatto_notify_drop_total",
        Unit::Count,
        "Total number of notifications dropped for slow subscribers."
    );
    describe_counter!(
        "scatto_media_cleanup_failure_total",
        Unit::Count,
        "Total number of failed deferred media removals."
    );
}
