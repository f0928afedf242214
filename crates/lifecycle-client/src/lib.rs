//! Client side of the game-server lifecycle SDK.
//!
//! The SDK sidecar owns readiness, health tracking and the condition state
//! machine. This crate only describes the capabilities the game server
//! consumes, through the [`LifecycleClient`] trait, and ships [`SdkClient`],
//! which reaches a sidecar over line-delimited JSON on TCP or a Unix socket.
//!
//! Enable the `test-support` feature for an in-process fake sidecar and a
//! recording client.

mod client;
mod condition;
mod errors;
mod event;
mod protocol;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
mod transport;

use std::sync::Arc;

pub use self::client::{DEFAULT_CALL_TIMEOUT, SdkClient};
pub use self::condition::Condition;
pub use self::errors::LifecycleError;
pub use self::event::{Constraint, NOT_IN_SERVICE, StateEvent};
pub use self::protocol::{SdkReply, SdkRequest};

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Capabilities of the lifecycle sidecar consumed by the game server.
pub trait LifecycleClient: Send + Sync {
    /// Marks the server ready to receive players.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the sidecar is unreachable or refuses.
    fn mark_ready(&self) -> Result<(), LifecycleError>;

    /// Sets a named boolean condition.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the sidecar is unreachable or refuses.
    fn set_condition(&self, condition: Condition, value: bool) -> Result<(), LifecycleError>;

    /// Sends one liveness ping.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the sidecar is unreachable or refuses.
    fn health_ping(&self) -> Result<(), LifecycleError>;

    /// Subscribes to external state notifications.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the subscription cannot be opened.
    fn watch(&self) -> Result<Box<dyn WatchStream>, LifecycleError>;
}

impl<T> LifecycleClient for Arc<T>
where
    T: LifecycleClient + ?Sized,
{
    fn mark_ready(&self) -> Result<(), LifecycleError> {
        (**self).mark_ready()
    }

    fn set_condition(&self, condition: Condition, value: bool) -> Result<(), LifecycleError> {
        (**self).set_condition(condition, value)
    }

    fn health_ping(&self) -> Result<(), LifecycleError> {
        (**self).health_ping()
    }

    fn watch(&self) -> Result<Box<dyn WatchStream>, LifecycleError> {
        (**self).watch()
    }
}

/// Blocking stream of [`StateEvent`] notifications.
pub trait WatchStream: Send {
    /// Waits for the next notification.
    ///
    /// Returns `Ok(None)` once the sidecar ends the stream.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the stream fails or carries a
    /// malformed notification.
    fn next_event(&mut self) -> Result<Option<StateEvent>, LifecycleError>;
}
