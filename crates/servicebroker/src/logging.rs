//! Process-wide log subscriber.
//!
//! Library code logs through the `log` facade; `init` bridges those records
//! into a `tracing` subscriber so they share one filter and formatter with
//! spans.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::error::LoggingError;
use crate::settings::LogSettings;

/// Builds the filter: `RUST_LOG` if set, otherwise the configured level.
pub fn build_filter(settings: &LogSettings) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&settings.level).map_err(|e| LoggingError::InvalidFilter {
        filter: settings.level.clone(),
        reason: e.to_string(),
    })
}

/// Installs the global subscriber and the `log` bridge.
///
/// Fails if a global subscriber or logger is already installed.
pub fn init(settings: &LogSettings) -> Result<(), LoggingError> {
    let filter = build_filter(settings)?;

    let format = if settings.json {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let subscriber = Registry::default().with(filter).with(format);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(())
}
