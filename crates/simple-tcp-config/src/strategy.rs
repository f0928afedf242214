//! Enumerated choices accepted by flags and environment overrides.

use clap::ValueEnum;
use strum::{Display, EnumString};

/// How the server keeps the lifecycle sidecar informed of its state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, ValueEnum)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SignalingStrategy {
    /// Send a health ping on a fixed interval until `UNHEALTHY` stops it.
    #[default]
    HealthPing,
    /// Subscribe to external state and retire the server when it is taken
    /// out of service.
    Watch,
}

/// Handling of malformed commands and unknown verbs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, ValueEnum)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ProtocolPolicy {
    /// Answer with a negative acknowledgement and keep serving.
    #[default]
    Reject,
    /// Log the violation and terminate the process with a failure status.
    Fatal,
}

/// Shape of log records written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, ValueEnum)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One flattened JSON object per record.
    #[default]
    Json,
    /// Single-line text for interactive use.
    Compact,
}
