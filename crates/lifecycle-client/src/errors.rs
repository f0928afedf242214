//! Error types for lifecycle sidecar calls.

use std::io;

use thiserror::Error;

/// Errors surfaced by a [`crate::LifecycleClient`].
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The sidecar endpoint could not be resolved.
    #[error("failed to resolve sidecar endpoint {endpoint}: {source}")]
    Resolve {
        /// Endpoint display form.
        endpoint: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Connecting to the sidecar failed.
    #[error("failed to connect to sidecar at {endpoint}: {source}")]
    Connect {
        /// Endpoint display form.
        endpoint: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The endpoint uses a transport unavailable on this platform.
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedTransport {
        /// Endpoint display form.
        endpoint: String,
    },
    /// Reading or writing the sidecar stream failed.
    #[error("sidecar IO error during {operation}: {source}")]
    Io {
        /// Operation in flight.
        operation: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A request could not be encoded.
    #[error("failed to encode {operation} request: {source}")]
    Encode {
        /// Operation in flight.
        operation: &'static str,
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// A reply or notification could not be decoded.
    #[error("malformed sidecar message during {operation}: {source}")]
    Decode {
        /// Operation in flight.
        operation: &'static str,
        /// Underlying deserialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// The sidecar refused the request.
    #[error("sidecar rejected {operation}: {message}")]
    Rejected {
        /// Operation that was refused.
        operation: &'static str,
        /// Reason reported by the sidecar.
        message: String,
    },
    /// The sidecar closed the stream before replying.
    #[error("sidecar closed the connection during {operation}")]
    Closed {
        /// Operation in flight.
        operation: &'static str,
    },
    /// A previous caller panicked while holding the sidecar channel.
    #[error("sidecar channel lock poisoned")]
    Poisoned,
}

impl LifecycleError {
    pub(crate) fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }

    /// Whether the connection that produced this error can no longer be
    /// trusted to pair requests with replies.
    pub(crate) fn breaks_channel(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Decode { .. } | Self::Closed { .. }
        )
    }
}
