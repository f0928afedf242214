//! Listener implementation for the game server socket.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use simple_tcp_config::SocketEndpoint;

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to a TCP endpoint.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    listener: TcpListener,
}

impl SocketListener {
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let SocketEndpoint::Tcp { host, port } = endpoint else {
            return Err(ListenerError::UnsupportedEndpoint {
                endpoint: endpoint.to_string(),
            });
        };
        let listener = bind_tcp(host, *port)?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(ConnectionRegistry::default());
        let handle = {
            let shutdown = Arc::clone(&shutdown);
            let connections = Arc::clone(&connections);
            thread::spawn(move || run_accept_loop(&self, &shutdown, &connections, &handler))
        };
        Ok(ListenerHandle {
            shutdown,
            connections,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept thread and the connections it opened.
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    connections: Arc<ConnectionRegistry>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Stops accepting and closes every open connection, so no further
    /// replies reach any client.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let closed = self.connections.close_all();
        if closed > 0 {
            info!(target: LISTENER_TARGET, closed, "closed open connections");
        }
    }

    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take().map(thread::JoinHandle::join) {
            Some(Err(_)) => Err(ListenerError::ThreadPanic),
            Some(Ok(())) | None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    closed: bool,
    streams: HashMap<u64, TcpStream>,
}

/// Live connection streams, keyed by an accept counter.
#[derive(Debug, Default)]
struct ConnectionRegistry {
    next_id: AtomicU64,
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracks `stream`; `None` once the registry has been closed.
    fn register(&self, stream: &TcpStream) -> io::Result<Option<u64>> {
        let tracked = stream.try_clone()?;
        let mut state = self.lock();
        if state.closed {
            return Ok(None);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.streams.insert(id, tracked);
        Ok(Some(id))
    }

    fn release(&self, id: u64) {
        self.lock().streams.remove(&id);
    }

    fn close_all(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let streams: Vec<TcpStream> = state.streams.drain().map(|(_, stream)| stream).collect();
        drop(state);
        for stream in &streams {
            if let Err(error) = stream.shutdown(Shutdown::Both) {
                debug!(target: LISTENER_TARGET, error = %error, "connection already closed");
            }
        }
        streams.len()
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &AtomicBool,
    connections: &Arc<ConnectionRegistry>,
    handler: &Arc<dyn ConnectionHandler>,
) {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        "socket listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some((stream, peer))) => {
                last_error = None;
                debug!(target: LISTENER_TARGET, %peer, "accepted connection");
                spawn_connection(stream, peer, connections, handler);
            }
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: LISTENER_TARGET, "socket listener stopped");
}

fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    connections: &Arc<ConnectionRegistry>,
    handler: &Arc<dyn ConnectionHandler>,
) {
    let id = match connections.register(&stream) {
        Ok(Some(id)) => id,
        Ok(None) => {
            debug!(
                target: LISTENER_TARGET,
                %peer,
                "dropping connection accepted during shutdown"
            );
            return;
        }
        Err(error) => {
            warn!(
                target: LISTENER_TARGET,
                %peer,
                error = %error,
                "failed to track connection"
            );
            return;
        }
    };
    let handler = Arc::clone(handler);
    let registry = Arc::clone(connections);
    let spawned = thread::Builder::new()
        .name(format!("conn-{peer}"))
        .spawn(move || {
            handler.handle(stream);
            registry.release(id);
        });
    if let Err(error) = spawned {
        connections.release(id);
        warn!(
            target: LISTENER_TARGET,
            %peer,
            error = %error,
            "failed to spawn connection thread"
        );
    }
}

fn accept_connection(listener: &TcpListener) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    match listener.accept() {
        Ok((stream, peer)) => {
            stream.set_nonblocking(false)?;
            Ok(Some((stream, peer)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}
