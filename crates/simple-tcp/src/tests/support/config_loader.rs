//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::time::Duration;

use simple_tcp_config::{Config, ConfigError, ProtocolPolicy, SignalingStrategy, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader binding an ephemeral loopback port with fast signalling timers.
#[derive(Debug, Clone)]
pub struct TestConfigLoader {
    config: Config,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config {
                listen_host: "127.0.0.1".to_owned(),
                port: 0,
                sdk_endpoint: SocketEndpoint::tcp("127.0.0.1", 9),
                health_interval: Duration::from_millis(25),
                watch_grace: Duration::from_millis(10),
                ..Config::default()
            },
        }
    }

    pub fn set_signaling(&mut self, strategy: SignalingStrategy) {
        self.config.signaling = strategy;
    }

    pub fn set_protocol_policy(&mut self, policy: ProtocolPolicy) {
        self.config.protocol_policy = policy;
    }

    pub fn set_listen_endpoint(&mut self, host: &str, port: u16) {
        self.config.listen_host = host.to_owned();
        self.config.port = port;
    }
}

impl Default for TestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Loader that intentionally fails through a malformed environment override.
#[derive(Debug, Clone, Copy)]
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load_from(["simple-tcp"], |key| {
            (key == "PORT").then(|| OsString::from("not-a-port"))
        })
    }
}
