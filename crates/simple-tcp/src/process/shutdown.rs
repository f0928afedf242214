use std::fmt;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use signal_hook::low_level::signal_name;
use thiserror::Error;
use tracing::{debug, info};

use super::PROCESS_TARGET;

/// Why the server stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A termination signal arrived.
    Signal(String),
    /// A client sent `EXIT`.
    ExitCommand,
    /// The watch strategy retired the server after an out-of-service notice.
    Retired,
    /// An unrecoverable error occurred.
    Fatal(String),
}

impl ShutdownReason {
    /// Process exit code associated with this reason.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Signal(_) | Self::ExitCommand | Self::Retired => 0,
            Self::Fatal(_) => 1,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "received {name}"),
            Self::ExitCommand => f.write_str("exit requested by client"),
            Self::Retired => f.write_str("retired after leaving service"),
            Self::Fatal(message) => write!(f, "fatal error: {message}"),
        }
    }
}

/// Cloneable sender feeding the supervisor's shutdown channel.
#[derive(Debug, Clone)]
pub(crate) struct ShutdownHandle {
    sender: Sender<ShutdownReason>,
}

impl ShutdownHandle {
    /// Asks the supervisor to stop. Requests after the first are ignored.
    pub(crate) fn request(&self, reason: ShutdownReason) {
        debug!(target: PROCESS_TARGET, %reason, "shutdown requested");
        if self.sender.send(reason).is_err() {
            debug!(target: PROCESS_TARGET, "supervisor already stopped");
        }
    }
}

pub(crate) fn shutdown_channel() -> (ShutdownHandle, Receiver<ShutdownReason>) {
    let (sender, receiver) = mpsc::channel();
    (ShutdownHandle { sender }, receiver)
}

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until a termination signal arrives and returns its name.
    fn wait(&self) -> Result<String, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The signal iterator ended without delivering a signal.
    #[error("signal listener closed")]
    Closed,
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<String, ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        let signal = signals.forever().next().ok_or(ShutdownError::Closed)?;
        let name = signal_name(signal).map_or_else(|| format!("signal {signal}"), str::to_owned);
        info!(target: PROCESS_TARGET, signal = %name, "shutdown signal received");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ShutdownReason::Signal("SIGTERM".to_owned()), 0)]
    #[case(ShutdownReason::ExitCommand, 0)]
    #[case(ShutdownReason::Retired, 0)]
    #[case(ShutdownReason::Fatal("boom".to_owned()), 1)]
    fn reasons_map_to_exit_codes(#[case] reason: ShutdownReason, #[case] code: u8) {
        assert_eq!(reason.exit_code(), code);
    }

    #[test]
    fn first_request_wins() {
        let (handle, receiver) = shutdown_channel();
        handle.request(ShutdownReason::ExitCommand);
        handle.clone().request(ShutdownReason::Fatal("late".to_owned()));
        assert_eq!(receiver.recv().expect("reason"), ShutdownReason::ExitCommand);
    }

    #[test]
    fn requests_after_supervisor_exit_are_ignored() {
        let (handle, receiver) = shutdown_channel();
        drop(receiver);
        handle.request(ShutdownReason::ExitCommand);
    }
}
