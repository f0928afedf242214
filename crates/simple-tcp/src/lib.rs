//! Sample game server speaking a newline-delimited text protocol over TCP.
//!
//! Each accepted connection is served on its own thread. Every line is a
//! single command that maps to at most one call on the lifecycle SDK
//! sidecar: setting a condition such as `filled` or `retired`, stopping
//! health pings, reporting the build version, or stopping the process.
//!
//! Startup follows a fixed sequence: resolve configuration, initialise
//! structured telemetry, connect to the sidecar, bind the listener, start the
//! background signalling task and mark the server ready. After that a single
//! supervisor waits for the first [`ShutdownReason`], whether it comes from a
//! termination signal, an `EXIT` command, the watch strategy retiring the
//! server, or a fatal error, and turns it into the process exit code.

mod bootstrap;
mod dispatch;
mod process;
mod signaling;
mod status;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ClientConnector, ConfigLoader, SdkConnector, Server, StaticConfigLoader,
    SystemConfigLoader, bootstrap_with,
};
pub use process::{
    LaunchError, ShutdownError, ShutdownReason, ShutdownSignal, SystemShutdownSignal, run_server,
};
pub use signaling::SignalingError;
pub use status::{StatusReporter, StructuredStatusReporter};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

/// Build version reported by the `VERSION` command.
pub const VERSION: &str = env!("SIMPLE_TCP_VERSION");

#[cfg(test)]
mod tests;
