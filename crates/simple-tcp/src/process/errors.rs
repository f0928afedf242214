//! Defines the unified error surface for server launch and supervision.

use thiserror::Error;

use lifecycle_client::LifecycleError;
use simple_tcp_config::ConfigError;

use crate::bootstrap::BootstrapError;
use crate::signaling::SignalingError;
use crate::transport::ListenerError;

/// Errors surfaced while launching or supervising the server.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// Bootstrapping the server failed.
    #[error("server bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// Socket listener startup failed.
    #[error("socket listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// The background signalling task could not start.
    #[error("lifecycle signalling failed to start: {source}")]
    Signaling {
        /// Underlying signalling error.
        #[source]
        source: SignalingError,
    },
    /// The sidecar refused to mark the server ready.
    #[error("failed to mark server ready: {source}")]
    Ready {
        /// Underlying lifecycle error.
        #[source]
        source: LifecycleError,
    },
}

impl From<ConfigError> for LaunchError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<SignalingError> for LaunchError {
    fn from(source: SignalingError) -> Self {
        Self::Signaling { source }
    }
}
