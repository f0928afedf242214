//! Test double for [`StatusReporter`] that records structured events for assertions.

use std::net::SocketAddr;
use std::sync::Mutex;

use simple_tcp_config::Config;

use crate::bootstrap::BootstrapError;
use crate::process::ShutdownReason;
use crate::status::StatusReporter;

/// Structured status events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The listener is accepting connections.
    Listening(SocketAddr),
    /// The supervisor began shutting down.
    Stopping(ShutdownReason),
}

/// Records status events for assertions.
#[derive(Debug, Default)]
pub struct RecordingStatusReporter {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingStatusReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .expect("status reporter mutex poisoned")
            .clone()
    }

    /// Address reported by the listener, if it has started.
    #[must_use]
    pub fn listening_addr(&self) -> Option<SocketAddr> {
        self.events().into_iter().find_map(|event| match event {
            StatusEvent::Listening(addr) => Some(addr),
            _ => None,
        })
    }

    fn record(&self, event: StatusEvent) {
        self.events
            .lock()
            .expect("status reporter mutex poisoned")
            .push(event);
    }
}

impl StatusReporter for RecordingStatusReporter {
    fn bootstrap_starting(&self) {
        self.record(StatusEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(StatusEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(StatusEvent::BootstrapFailed(error.to_string()));
    }

    fn listening(&self, addr: SocketAddr) {
        self.record(StatusEvent::Listening(addr));
    }

    fn stopping(&self, reason: &ShutdownReason) {
        self.record(StatusEvent::Stopping(reason.clone()));
    }
}
