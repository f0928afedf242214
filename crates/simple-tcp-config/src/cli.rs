//! Command-line flags accepted by the server binary.

use clap::Parser;

use crate::defaults::{
    DEFAULT_HEALTH_INTERVAL_MS, DEFAULT_LISTEN_HOST, DEFAULT_LOG_FILTER, DEFAULT_PORT,
    DEFAULT_WATCH_GRACE_MS, default_sdk_endpoint,
};
use crate::{LogFormat, ProtocolPolicy, SignalingStrategy, SocketEndpoint};

const AFTER_LONG_HELP: &str = "\
Commands (one per line; replies are a single line):
  FILLED <bool>        Set the filled condition.
  RETIRED <bool>       Set the retired condition.
  HASPLAYER <bool>     Set the has-player condition.
  HASNOPLAYER <bool>   Set the has-no-player condition.
  UNHEALTHY            Stop sending health pings (health-ping strategy only).
  EXIT                 Stop the server with status 0.
  VERSION              Print the build version.

Only the exact token TRUE is true; any other argument clears the condition.

Environment (wins over the matching flag; blank values are ignored):
  PORT, HOST, SDK_ENDPOINT, SIGNALING, PROTOCOL_POLICY,
  HEALTH_INTERVAL_MS, WATCH_GRACE_MS, RUST_LOG, LOG_FORMAT";

/// Flags parsed from the command line before environment overrides apply.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "simple-tcp",
    version,
    about = "Sample TCP game server driving a lifecycle SDK sidecar",
    after_long_help = AFTER_LONG_HELP
)]
pub(crate) struct ConfigArgs {
    /// The port to listen to TCP traffic on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub(crate) port: u16,
    /// The interface to bind the listener to.
    #[arg(long, default_value = DEFAULT_LISTEN_HOST)]
    pub(crate) host: String,
    /// Address of the lifecycle SDK sidecar (`tcp://host:port` or `unix:///path`).
    #[arg(long, default_value_t = default_sdk_endpoint())]
    pub(crate) sdk_endpoint: SocketEndpoint,
    /// Lifecycle signalling strategy.
    #[arg(long, value_enum, default_value_t = SignalingStrategy::HealthPing)]
    pub(crate) signaling: SignalingStrategy,
    /// Handling of malformed commands and unknown verbs.
    #[arg(long, value_enum, default_value_t = ProtocolPolicy::Reject)]
    pub(crate) protocol_policy: ProtocolPolicy,
    /// Milliseconds between health pings.
    #[arg(long, default_value_t = DEFAULT_HEALTH_INTERVAL_MS)]
    pub(crate) health_interval_ms: u64,
    /// Milliseconds to wait before retiring once taken out of service.
    #[arg(long, default_value_t = DEFAULT_WATCH_GRACE_MS)]
    pub(crate) watch_grace_ms: u64,
    /// Tracing filter expression.
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    pub(crate) log_filter: String,
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    pub(crate) log_format: LogFormat,
}
