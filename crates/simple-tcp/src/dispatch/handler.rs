//! Connection handler that dispatches line-protocol commands.
//!
//! Lines are handled strictly in sequence: the next line is read only after
//! the previous reply has been written. Transport failures end the
//! connection; everything else is answered on it or escalated to the
//! supervisor through the shutdown channel.

use std::io::{BufRead, BufReader, Read};
use std::net::TcpStream;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use lifecycle_client::{Condition, LifecycleClient};
use simple_tcp_config::ProtocolPolicy;

use crate::VERSION;
use crate::process::shutdown::{ShutdownHandle, ShutdownReason};
use crate::signaling::CancellationToken;
use crate::transport::ConnectionHandler;

use super::DISPATCH_TARGET;
use super::command::{self, Command, Verb};
use super::errors::{DispatchError, ProtocolError};
use super::response::{Response, ResponseWriter};

/// Maximum size of a single command line in bytes, excluding the newline.
pub(crate) const MAX_LINE_BYTES: usize = 64 * 1024;

/// What the connection loop does after a command.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Reply(Response),
    Close,
}

/// Dispatches each command line to the lifecycle client.
pub(crate) struct DispatchConnectionHandler {
    client: Arc<dyn LifecycleClient>,
    health: Option<CancellationToken>,
    shutdown: ShutdownHandle,
    policy: ProtocolPolicy,
}

impl DispatchConnectionHandler {
    /// `health` is the pinger's cancellation token; `None` disables `UNHEALTHY`.
    pub(crate) fn new(
        client: Arc<dyn LifecycleClient>,
        health: Option<CancellationToken>,
        shutdown: ShutdownHandle,
        policy: ProtocolPolicy,
    ) -> Self {
        Self {
            client,
            health,
            shutdown,
            policy,
        }
    }

    fn serve(&self, stream: TcpStream) -> Result<(), DispatchError> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = ResponseWriter::new(stream);
        let mut buffer = Vec::new();
        while read_line(&mut reader, &mut buffer)? {
            let line = String::from_utf8_lossy(&buffer);
            match self.execute(&line) {
                Outcome::Reply(response) => writer.write(&response)?,
                Outcome::Close => break,
            }
        }
        Ok(())
    }

    pub(crate) fn execute(&self, line: &str) -> Outcome {
        let command = match command::parse(line) {
            Ok(command) => command,
            Err(error) => return self.protocol_error(&error),
        };
        debug!(target: DISPATCH_TARGET, ?command, "dispatching command");
        match command {
            Command::SetCondition {
                verb,
                condition,
                value,
            } => Outcome::Reply(self.set_condition(verb, condition, value)),
            Command::Unhealthy => self.stop_health_pings(),
            Command::Exit => {
                info!(target: DISPATCH_TARGET, "exit requested by client");
                self.shutdown.request(ShutdownReason::ExitCommand);
                Outcome::Close
            }
            Command::Version => Outcome::Reply(Response::Text(VERSION.to_owned())),
        }
    }

    fn set_condition(&self, verb: Verb, condition: Condition, value: bool) -> Response {
        match self.client.set_condition(condition, value) {
            Ok(()) => {
                info!(target: DISPATCH_TARGET, %condition, value, "condition updated");
                Response::Ack(verb)
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    %condition,
                    value,
                    error = %error,
                    "condition update failed"
                );
                Response::nack(verb, error)
            }
        }
    }

    fn stop_health_pings(&self) -> Outcome {
        let Some(token) = &self.health else {
            return self.protocol_error(&ProtocolError::UnknownVerb {
                verb: Verb::Unhealthy.to_string(),
            });
        };
        if token.cancel() {
            info!(target: DISPATCH_TARGET, "health pings cancelled by client");
        } else {
            debug!(target: DISPATCH_TARGET, "health pings already cancelled");
        }
        Outcome::Reply(Response::Ack(Verb::Unhealthy))
    }

    fn protocol_error(&self, error: &ProtocolError) -> Outcome {
        match self.policy {
            ProtocolPolicy::Reject => {
                warn!(target: DISPATCH_TARGET, %error, "rejected command");
                Outcome::Reply(Response::rejected(error))
            }
            ProtocolPolicy::Fatal => {
                error!(target: DISPATCH_TARGET, %error, "invalid command");
                self.shutdown
                    .request(ShutdownReason::Fatal(format!("invalid command: {error}")));
                Outcome::Close
            }
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string());
        info!(target: DISPATCH_TARGET, %peer, "client connected");
        match self.serve(stream) {
            Ok(()) => info!(target: DISPATCH_TARGET, %peer, "client disconnected"),
            Err(error) => warn!(target: DISPATCH_TARGET, %peer, %error, "connection closed"),
        }
    }
}

/// Reads one line into `buffer` without its terminator.
///
/// Returns `Ok(false)` at end of stream. A final line without a newline is
/// still returned.
fn read_line<R: BufRead>(reader: &mut R, buffer: &mut Vec<u8>) -> Result<bool, DispatchError> {
    buffer.clear();
    let limit = MAX_LINE_BYTES as u64 + 1;
    let read = reader.by_ref().take(limit).read_until(b'\n', buffer)?;
    if read == 0 {
        return Ok(false);
    }
    if buffer.last() == Some(&b'\n') {
        buffer.pop();
    } else if buffer.len() > MAX_LINE_BYTES {
        return Err(DispatchError::LineTooLong {
            max_bytes: MAX_LINE_BYTES,
        });
    }
    Ok(true)
}
