//! Structured telemetry initialisation for the server.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::UtcTime;

use simple_tcp_config::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Repeated calls are idempotent: later invocations return a fresh
/// [`TelemetryHandle`] without touching the global state again, even when
/// they carry a different configuration.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = parse_filter(config.log_filter())?;
    let subscriber = build_subscriber(filter, config.log_format());
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn parse_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter(error.to_string()))
}

/// Connection handlers and the signalling task run on their own threads, so
/// thread names are kept in every record.
fn build_subscriber(filter: EnvFilter, format: LogFormat) -> Box<dyn Subscriber + Send + Sync> {
    let base = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(true)
        .with_thread_names(true)
        .with_timer(UtcTime::rfc_3339());
    match format {
        LogFormat::Json => Box::new(base.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(base.compact().finish()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialisation_is_idempotent() {
        let config = Config {
            log_format: LogFormat::Compact,
            ..Config::default()
        };
        initialise(&config).expect("first initialisation");
        initialise(&Config::default()).expect("second initialisation");
    }

    #[test]
    fn invalid_filters_are_rejected() {
        let error = parse_filter("simple_tcp=notalevel").expect_err("filter should fail");
        assert!(matches!(error, TelemetryError::Filter(_)));
    }

    #[test]
    fn module_filters_parse() {
        assert!(parse_filter("info,simple_tcp::dispatch=debug").is_ok());
    }
}
