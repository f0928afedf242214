//! Configuration for the `simple-tcp` game server.
//!
//! Settings are read from command-line flags first and then overlaid with
//! environment variables, so a value exported by the orchestrator (for
//! example `PORT`) always wins over the flag baked into a container command.
//! Resolution is a pure function of the argument list and an environment
//! lookup, which keeps precedence rules testable without mutating the process
//! environment.

mod cli;
mod defaults;
mod socket;
mod strategy;

use std::env;
use std::ffi::OsString;
use std::str::FromStr;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use thiserror::Error;

use self::cli::ConfigArgs;

pub use self::defaults::{
    DEFAULT_HEALTH_INTERVAL_MS, DEFAULT_LISTEN_HOST, DEFAULT_LOG_FILTER, DEFAULT_PORT,
    DEFAULT_SDK_HOST, DEFAULT_SDK_PORT, DEFAULT_WATCH_GRACE_MS, default_health_interval,
    default_log_filter, default_log_format, default_protocol_policy, default_sdk_endpoint,
    default_signaling, default_watch_grace,
};
pub use self::socket::{SocketEndpoint, SocketParseError};
pub use self::strategy::{LogFormat, ProtocolPolicy, SignalingStrategy};

/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "PORT";
/// Environment variable overriding the listen host.
pub const HOST_ENV: &str = "HOST";
/// Environment variable overriding the sidecar endpoint.
pub const SDK_ENDPOINT_ENV: &str = "SDK_ENDPOINT";
/// Environment variable overriding the signalling strategy.
pub const SIGNALING_ENV: &str = "SIGNALING";
/// Environment variable overriding the protocol policy.
pub const PROTOCOL_POLICY_ENV: &str = "PROTOCOL_POLICY";
/// Environment variable overriding the health ping interval in milliseconds.
pub const HEALTH_INTERVAL_ENV: &str = "HEALTH_INTERVAL_MS";
/// Environment variable overriding the watch grace period in milliseconds.
pub const WATCH_GRACE_ENV: &str = "WATCH_GRACE_MS";
/// Environment variable overriding the log filter.
pub const LOG_FILTER_ENV: &str = "RUST_LOG";
/// Environment variable overriding the log format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// The flag surface behind [`Config::load`], for help and manual rendering.
#[must_use]
pub fn command() -> clap::Command {
    ConfigArgs::command()
}

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Interface the listener binds to.
    pub listen_host: String,
    /// Port the listener binds to.
    pub port: u16,
    /// Address of the lifecycle SDK sidecar.
    pub sdk_endpoint: SocketEndpoint,
    /// Lifecycle signalling strategy.
    pub signaling: SignalingStrategy,
    /// Handling of malformed commands and unknown verbs.
    pub protocol_policy: ProtocolPolicy,
    /// Interval between health pings.
    pub health_interval: Duration,
    /// Wait applied by the watch strategy before retiring.
    pub watch_grace: Duration,
    /// Tracing filter expression.
    pub log_filter: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: DEFAULT_LISTEN_HOST.to_owned(),
            port: DEFAULT_PORT,
            sdk_endpoint: default_sdk_endpoint(),
            signaling: default_signaling(),
            protocol_policy: default_protocol_policy(),
            health_interval: default_health_interval(),
            watch_grace: default_watch_grace(),
            log_filter: default_log_filter().to_owned(),
            log_format: default_log_format(),
        }
    }
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command-line parsing failed, or help/version output was requested.
    #[error(transparent)]
    Arguments(#[from] clap::Error),
    /// An environment override could not be parsed.
    #[error("invalid value '{value}' for environment variable {key}: {message}")]
    InvalidEnvironment {
        /// Variable name.
        key: &'static str,
        /// Raw value as read from the environment.
        value: String,
        /// Parser diagnostic.
        message: String,
    },
    /// The health ping interval resolved to zero.
    #[error("health ping interval must be greater than zero")]
    ZeroHealthInterval,
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when flags fail to parse or an environment
    /// override holds an unparsable value.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(env::args_os(), |key| env::var_os(key))
    }

    /// Loads configuration from explicit arguments and an environment lookup.
    ///
    /// The first argument is treated as the program name, matching
    /// [`std::env::args_os`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when flags fail to parse or an environment
    /// override holds an unparsable value.
    pub fn load_from<I, T, F>(args: I, lookup: F) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        F: Fn(&str) -> Option<OsString>,
    {
        let args = ConfigArgs::try_parse_from(args)?;
        let overrides = EnvOverrides { lookup: &lookup };

        let health_interval_ms = overrides
            .parsed(HEALTH_INTERVAL_ENV)?
            .unwrap_or(args.health_interval_ms);
        if health_interval_ms == 0 {
            return Err(ConfigError::ZeroHealthInterval);
        }
        let watch_grace_ms = overrides
            .parsed(WATCH_GRACE_ENV)?
            .unwrap_or(args.watch_grace_ms);

        Ok(Self {
            listen_host: overrides.raw(HOST_ENV).unwrap_or(args.host),
            port: overrides.parsed(PORT_ENV)?.unwrap_or(args.port),
            sdk_endpoint: overrides
                .parsed(SDK_ENDPOINT_ENV)?
                .unwrap_or(args.sdk_endpoint),
            signaling: overrides.parsed(SIGNALING_ENV)?.unwrap_or(args.signaling),
            protocol_policy: overrides
                .parsed(PROTOCOL_POLICY_ENV)?
                .unwrap_or(args.protocol_policy),
            health_interval: Duration::from_millis(health_interval_ms),
            watch_grace: Duration::from_millis(watch_grace_ms),
            log_filter: overrides.raw(LOG_FILTER_ENV).unwrap_or(args.log_filter),
            log_format: overrides.parsed(LOG_FORMAT_ENV)?.unwrap_or(args.log_format),
        })
    }

    /// Endpoint the TCP listener binds to.
    #[must_use]
    pub fn listen_endpoint(&self) -> SocketEndpoint {
        SocketEndpoint::tcp(self.listen_host.clone(), self.port)
    }

    /// Address of the lifecycle SDK sidecar.
    #[must_use]
    pub fn sdk_endpoint(&self) -> &SocketEndpoint {
        &self.sdk_endpoint
    }

    /// Configured signalling strategy.
    #[must_use]
    pub fn signaling(&self) -> SignalingStrategy {
        self.signaling
    }

    /// Configured protocol policy.
    #[must_use]
    pub fn protocol_policy(&self) -> ProtocolPolicy {
        self.protocol_policy
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

struct EnvOverrides<'a, F> {
    lookup: &'a F,
}

impl<F> EnvOverrides<'_, F>
where
    F: Fn(&str) -> Option<OsString>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.to_string_lossy().trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn parsed<V>(&self, key: &'static str) -> Result<Option<V>, ConfigError>
    where
        V: FromStr,
        V::Err: std::fmt::Display,
    {
        let Some(value) = self.raw(key) else {
            return Ok(None);
        };
        value
            .parse::<V>()
            .map(Some)
            .map_err(|error| ConfigError::InvalidEnvironment {
                key,
                message: error.to_string(),
                value,
            })
    }
}
