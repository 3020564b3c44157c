use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::conditional::{METRIC_NOT_FOUND, METRIC_NOT_MODIFIED, METRIC_PAYLOAD};
use crate::config::{LogFormat, LoggingSettings};
use crate::infra::http::api::rate_limit::METRIC_RATE_LIMITED;

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_NOT_MODIFIED,
            Unit::Count,
            "Conditional reads answered with 304 Not Modified."
        );
        describe_counter!(
            METRIC_PAYLOAD,
            Unit::Count,
            "Conditional reads that built and returned a full payload."
        );
        describe_counter!(
            METRIC_NOT_FOUND,
            Unit::Count,
            "Conditional reads whose resource did not exist."
        );
        describe_counter!(
            METRIC_RATE_LIMITED,
            Unit::Count,
            "API requests rejected by the per-key rate limiter."
        );
    });
}
