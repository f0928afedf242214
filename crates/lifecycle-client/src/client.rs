//! JSONL client for the lifecycle SDK sidecar.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;
use simple_tcp_config::SocketEndpoint;
use tracing::{debug, info, warn};

use crate::protocol::{SdkReply, SdkRequest};
use crate::transport::{self, Connection};
use crate::{CLIENT_TARGET, Condition, LifecycleClient, LifecycleError, StateEvent, WatchStream};

/// Upper bound on a single request and reply exchange with the sidecar.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle client speaking line-delimited JSON to the SDK sidecar.
///
/// Calls share one connection and are serialised behind a mutex, so the
/// client can be used from every connection handler and the background
/// signalling task at once. Each exchange is bounded by the call timeout. A
/// connection that timed out, failed or desynchronised is dropped and the
/// next call reconnects. Watch subscriptions open their own connection.
#[derive(Debug)]
pub struct SdkClient {
    endpoint: SocketEndpoint,
    call_timeout: Duration,
    channel: Mutex<Option<Channel>>,
}

impl SdkClient {
    /// Connects to the sidecar at `endpoint` using [`DEFAULT_CALL_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the endpoint cannot be resolved or
    /// reached within the connection timeout.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, LifecycleError> {
        Self::connect_with_timeout(endpoint, DEFAULT_CALL_TIMEOUT)
    }

    /// Connects to the sidecar, bounding every call by `call_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the endpoint cannot be resolved or
    /// reached within the connection timeout.
    pub fn connect_with_timeout(
        endpoint: &SocketEndpoint,
        call_timeout: Duration,
    ) -> Result<Self, LifecycleError> {
        let channel = Channel::open(endpoint, call_timeout)?;
        info!(
            target: CLIENT_TARGET,
            endpoint = %endpoint,
            call_timeout_ms = call_timeout.as_millis(),
            "connected to lifecycle sidecar"
        );
        Ok(Self {
            endpoint: endpoint.clone(),
            call_timeout,
            channel: Mutex::new(Some(channel)),
        })
    }

    fn call(&self, request: &SdkRequest) -> Result<(), LifecycleError> {
        let mut slot = self.channel.lock().map_err(|_| LifecycleError::Poisoned)?;
        let mut channel = match slot.take() {
            Some(channel) => channel,
            None => {
                debug!(target: CLIENT_TARGET, endpoint = %self.endpoint, "reconnecting");
                Channel::open(&self.endpoint, self.call_timeout)?
            }
        };
        let result = channel.round_trip(request);
        match &result {
            Err(error) if error.breaks_channel() => {
                warn!(
                    target: CLIENT_TARGET,
                    operation = request.operation(),
                    %error,
                    "dropping sidecar connection"
                );
            }
            _ => *slot = Some(channel),
        }
        result
    }
}

impl LifecycleClient for SdkClient {
    fn mark_ready(&self) -> Result<(), LifecycleError> {
        self.call(&SdkRequest::Ready)
    }

    fn set_condition(&self, condition: Condition, value: bool) -> Result<(), LifecycleError> {
        self.call(&SdkRequest::SetCondition { condition, value })
    }

    fn health_ping(&self) -> Result<(), LifecycleError> {
        self.call(&SdkRequest::Health)
    }

    fn watch(&self) -> Result<Box<dyn WatchStream>, LifecycleError> {
        let mut channel = Channel::open(&self.endpoint, self.call_timeout)?;
        channel.round_trip(&SdkRequest::Watch)?;
        channel
            .wait_indefinitely()
            .map_err(|source| LifecycleError::io("watch", source))?;
        info!(
            target: CLIENT_TARGET,
            endpoint = %self.endpoint,
            "watch subscription opened"
        );
        Ok(Box::new(SdkWatchStream { channel }))
    }
}

/// Notification stream backed by a dedicated sidecar connection.
#[derive(Debug)]
struct SdkWatchStream {
    channel: Channel,
}

impl WatchStream for SdkWatchStream {
    fn next_event(&mut self) -> Result<Option<StateEvent>, LifecycleError> {
        self.channel.receive("watch")
    }
}

#[derive(Debug)]
struct Channel {
    reader: BufReader<Connection>,
    writer: Connection,
}

impl Channel {
    fn open(endpoint: &SocketEndpoint, timeout: Duration) -> Result<Self, LifecycleError> {
        let writer = transport::connect(endpoint)?;
        writer
            .set_timeouts(Some(timeout), Some(timeout))
            .map_err(|source| LifecycleError::io("connect", source))?;
        let reader = writer
            .try_clone()
            .map_err(|source| LifecycleError::io("connect", source))?;
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Notifications arrive at the sidecar's pace, so reads stop timing out.
    fn wait_indefinitely(&self) -> io::Result<()> {
        self.writer.set_read_timeout(None)
    }

    fn round_trip(&mut self, request: &SdkRequest) -> Result<(), LifecycleError> {
        let operation = request.operation();
        self.send(request)?;
        match self.receive::<SdkReply>(operation)? {
            Some(SdkReply::Ok) => {
                debug!(target: CLIENT_TARGET, operation, "sidecar accepted request");
                Ok(())
            }
            Some(SdkReply::Error { message }) => {
                Err(LifecycleError::Rejected { operation, message })
            }
            None => Err(LifecycleError::Closed { operation }),
        }
    }

    fn send(&mut self, request: &SdkRequest) -> Result<(), LifecycleError> {
        let operation = request.operation();
        let mut line = serde_json::to_vec(request)
            .map_err(|source| LifecycleError::Encode { operation, source })?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .and_then(|()| self.writer.flush())
            .map_err(|source| LifecycleError::io(operation, source))
    }

    fn receive<T>(&mut self, operation: &'static str) -> Result<Option<T>, LifecycleError>
    where
        T: DeserializeOwned,
    {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|source| LifecycleError::io(operation, source))?;
        if read == 0 {
            return Ok(None);
        }
        serde_json::from_str(line.trim_end())
            .map(Some)
            .map_err(|source| LifecycleError::Decode { operation, source })
    }
}
