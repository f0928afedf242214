//! TCP listener for game client connections.
//!
//! The transport module binds the configured endpoint and accepts
//! connections in a background thread, handing each one to a
//! [`ConnectionHandler`] on its own thread.

mod errors;
mod handler;
mod listener;

pub use self::errors::ListenerError;
pub(crate) use self::handler::ConnectionHandler;
pub(crate) use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
