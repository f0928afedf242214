use std::time::Duration;

use crate::socket::SocketEndpoint;
use crate::strategy::{LogFormat, ProtocolPolicy, SignalingStrategy};

/// Default TCP port the game server listens on.
pub const DEFAULT_PORT: u16 = 7654;

/// Default interface the listener binds to.
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// Default host of the lifecycle SDK sidecar.
pub const DEFAULT_SDK_HOST: &str = "127.0.0.1";

/// Default port of the lifecycle SDK sidecar.
pub const DEFAULT_SDK_PORT: u16 = 9020;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default interval between health pings, in milliseconds.
pub const DEFAULT_HEALTH_INTERVAL_MS: u64 = 2_000;

/// Default wait before the watch strategy retires the server, in milliseconds.
pub const DEFAULT_WATCH_GRACE_MS: u64 = 5_000;

/// Default log filter expression used by the binary.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default lifecycle signalling strategy.
pub fn default_signaling() -> SignalingStrategy {
    SignalingStrategy::HealthPing
}

/// Default handling of malformed or unknown commands.
pub fn default_protocol_policy() -> ProtocolPolicy {
    ProtocolPolicy::Reject
}

/// Default interval between health pings.
pub fn default_health_interval() -> Duration {
    Duration::from_millis(DEFAULT_HEALTH_INTERVAL_MS)
}

/// Default wait applied by the watch strategy before retiring.
pub fn default_watch_grace() -> Duration {
    Duration::from_millis(DEFAULT_WATCH_GRACE_MS)
}

/// Computes the default sidecar endpoint.
pub fn default_sdk_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_SDK_HOST, DEFAULT_SDK_PORT)
}
