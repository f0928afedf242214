//! Line-protocol command dispatch for game client connections.
//!
//! Each connection carries newline-delimited text commands. A command is a
//! verb followed by space-separated arguments:
//!
//! ```text
//! FILLED TRUE
//! ACK: FILLED
//! VERSION
//! 0.1.0
//! BOGUS
//! NACK: BOGUS: unknown command
//! ```
//!
//! Condition verbs (`FILLED`, `RETIRED`, `HASPLAYER`, `HASNOPLAYER`) take a
//! single argument that maps to `true` only when it is exactly `TRUE`.
//! `UNHEALTHY` stops health pings, `EXIT` stops the process without a reply,
//! and `VERSION` reports the build version. Malformed lines and unknown
//! verbs are handled according to the configured [`ProtocolPolicy`].
//!
//! [`ProtocolPolicy`]: simple_tcp_config::ProtocolPolicy

mod command;
mod errors;
mod handler;
mod response;

pub(crate) use self::handler::DispatchConnectionHandler;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
