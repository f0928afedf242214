//! Socket transport helpers for reaching the lifecycle sidecar.
//!
//! The functions here establish connections to the configured endpoint and
//! wrap the resulting streams in a uniform [`Connection`] type so the client
//! can remain transport agnostic.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use simple_tcp_config::SocketEndpoint;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::LifecycleError;

pub(crate) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub(crate) enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    /// Bounds blocking reads and writes; `None` waits indefinitely.
    pub(crate) fn set_timeouts(
        &self,
        read: Option<Duration>,
        write: Option<Duration>,
    ) -> io::Result<()> {
        self.set_read_timeout(read)?;
        match self {
            Self::Tcp(stream) => stream.set_write_timeout(write),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_write_timeout(write),
        }
    }

    pub(crate) fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_read_timeout(timeout),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_read_timeout(timeout),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

pub(crate) fn connect(endpoint: &SocketEndpoint) -> Result<Connection, LifecycleError> {
    match endpoint {
        SocketEndpoint::Tcp { host, port } => {
            let endpoint_display = endpoint.to_string();
            let address =
                resolve_tcp_address(host, *port).map_err(|source| LifecycleError::Resolve {
                    endpoint: endpoint_display.clone(),
                    source,
                })?;

            TcpStream::connect_timeout(&address, CONNECTION_TIMEOUT)
                .map(Connection::Tcp)
                .map_err(|source| LifecycleError::Connect {
                    endpoint: endpoint_display,
                    source,
                })
        }
        SocketEndpoint::Unix { path } => {
            #[cfg(unix)]
            {
                UnixStream::connect(path.as_std_path())
                    .map(Connection::Unix)
                    .map_err(|source| LifecycleError::Connect {
                        endpoint: endpoint.to_string(),
                        source,
                    })
            }

            #[cfg(not(unix))]
            {
                let _ = path;
                Err(LifecycleError::UnsupportedTransport {
                    endpoint: endpoint.to_string(),
                })
            }
        }
    }
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn refused_tcp_endpoint_reports_connect_error() {
        let port = {
            let spare = TcpListener::bind(("127.0.0.1", 0)).expect("bind spare port");
            spare.local_addr().expect("spare port address").port()
        };
        let endpoint = SocketEndpoint::tcp("127.0.0.1", port);

        let error = connect(&endpoint).expect_err("nothing listens on the spare port");

        assert!(matches!(
            error,
            LifecycleError::Connect { endpoint, .. } if endpoint.contains("127.0.0.1")
        ));
    }

    #[cfg(unix)]
    #[rstest]
    fn connects_over_unix_socket() {
        use std::io::{BufRead, BufReader};
        use std::os::unix::net::UnixListener;

        use camino::Utf8PathBuf;

        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("sidecar.sock"))
            .expect("utf-8 temp path");
        let listener = UnixListener::bind(path.as_std_path()).expect("bind unix socket");

        let mut connection = connect(&SocketEndpoint::unix(path)).expect("connect");
        connection.write_all(b"ping\n").expect("write");
        connection.flush().expect("flush");

        let (stream, _) = listener.accept().expect("accept");
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).expect("read");
        assert_eq!(line, "ping\n");
    }

    #[cfg(unix)]
    #[rstest]
    fn missing_unix_socket_reports_connect_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.sock");
        let endpoint = SocketEndpoint::unix(path.to_string_lossy().into_owned());

        let error = connect(&endpoint).expect_err("socket file does not exist");

        assert!(matches!(error, LifecycleError::Connect { .. }));
    }
}
