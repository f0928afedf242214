//! Stream socket addresses for the listener and the lifecycle sidecar.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use url::Url;

/// Address of a stream socket.
///
/// Parsed from `tcp://host:port`, `unix:///path/to/socket`, or a bare
/// `host:port` pair, which is read as TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEndpoint {
    /// TCP socket endpoint.
    Tcp {
        /// Host name or IP address, without brackets for IPv6.
        host: String,
        /// TCP port.
        port: u16,
    },
    /// Unix domain socket endpoint.
    Unix {
        /// Filesystem path of the socket.
        path: Utf8PathBuf,
    },
}

impl SocketEndpoint {
    /// Builds a TCP socket endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Socket path for Unix endpoints.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_path()),
            Self::Tcp { .. } => None,
        }
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => {
                write!(formatter, "tcp://[{host}]:{port}")
            }
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
            Self::Unix { path } => write!(formatter, "unix://{path}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.contains("://") {
            parse_url(input)
        } else {
            parse_host_port(input)
        }
    }
}

fn parse_url(input: &str) -> Result<SocketEndpoint, SocketParseError> {
    let url = Url::parse(input).map_err(|source| SocketParseError::Url {
        input: input.to_owned(),
        source,
    })?;
    match url.scheme() {
        "tcp" => {
            let host = url
                .host_str()
                .filter(|host| !host.is_empty())
                .ok_or_else(|| SocketParseError::MissingHost(input.to_owned()))?;
            let port = url
                .port()
                .ok_or_else(|| SocketParseError::MissingPort(input.to_owned()))?;
            Ok(SocketEndpoint::tcp(
                host.trim_start_matches('[').trim_end_matches(']'),
                port,
            ))
        }
        "unix" => match url.path() {
            "" | "/" => Err(SocketParseError::MissingUnixPath(input.to_owned())),
            path => Ok(SocketEndpoint::unix(path)),
        },
        other => Err(SocketParseError::UnsupportedScheme(other.to_owned())),
    }
}

fn parse_host_port(input: &str) -> Result<SocketEndpoint, SocketParseError> {
    let (host, port) = input
        .rsplit_once(':')
        .ok_or_else(|| SocketParseError::MissingPort(input.to_owned()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(SocketParseError::MissingHost(input.to_owned()));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| SocketParseError::InvalidPort(input.to_owned()))?;
    Ok(SocketEndpoint::tcp(host, port))
}

/// Errors encountered while parsing a [`SocketEndpoint`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Scheme was neither `tcp` nor `unix`.
    #[error("unsupported socket scheme '{0}', expected tcp or unix")]
    UnsupportedScheme(String),
    /// TCP host name was missing.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// TCP port was missing.
    #[error("missing TCP port in '{0}'")]
    MissingPort(String),
    /// TCP port was not a number between 0 and 65535.
    #[error("invalid TCP port in '{0}'")]
    InvalidPort(String),
    /// Unix socket path was absent.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// The URL form could not be parsed.
    #[error("malformed socket URL '{input}': {source}")]
    Url {
        /// Text as supplied.
        input: String,
        /// Underlying URL error.
        #[source]
        source: url::ParseError,
    },
}
