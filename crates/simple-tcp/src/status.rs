//! Structured status reporting for server lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use simple_tcp_config::Config;

use crate::bootstrap::BootstrapError;
use crate::process::ShutdownReason;

const STATUS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::status");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait StatusReporter: Send + Sync {
    /// Invoked before bootstrap begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the listener accepts connections.
    fn listening(&self, addr: SocketAddr);

    /// Invoked when the supervisor starts shutting down.
    fn stopping(&self, reason: &ShutdownReason);
}

impl<T> StatusReporter for Arc<T>
where
    T: StatusReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listening(&self, addr: SocketAddr) {
        (**self).listening(addr);
    }

    fn stopping(&self, reason: &ShutdownReason) {
        (**self).stopping(reason);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredStatusReporter;

impl StructuredStatusReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StatusReporter for StructuredStatusReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: STATUS_TARGET,
            event = "bootstrap_starting",
            "starting server bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: STATUS_TARGET,
            event = "bootstrap_succeeded",
            sdk_endpoint = %config.sdk_endpoint(),
            signaling = %config.signaling(),
            protocol_policy = %config.protocol_policy(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "server bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: STATUS_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "server bootstrap failed"
        );
    }

    fn listening(&self, addr: SocketAddr) {
        tracing::info!(
            target: STATUS_TARGET,
            event = "listening",
            %addr,
            "accepting connections"
        );
    }

    fn stopping(&self, reason: &ShutdownReason) {
        let code = reason.exit_code();
        if code == 0 {
            tracing::info!(
                target: STATUS_TARGET,
                event = "stopping",
                %reason,
                code,
                "shutting down"
            );
        } else {
            tracing::error!(
                target: STATUS_TARGET,
                event = "stopping",
                %reason,
                code,
                "shutting down"
            );
        }
    }
}
