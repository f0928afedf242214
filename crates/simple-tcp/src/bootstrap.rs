//! Server bootstrap orchestration.

use std::sync::Arc;

use thiserror::Error;

use lifecycle_client::{LifecycleClient, LifecycleError, SdkClient};
use simple_tcp_config::{Config, ConfigError, SocketEndpoint};

use crate::status::StatusReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when flags or environment overrides are invalid.
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load()
    }
}

/// Loader that returns a pre-resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Opens the lifecycle client for a sidecar endpoint.
pub trait ClientConnector: Send + Sync {
    /// Connects to the sidecar.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the sidecar cannot be reached.
    fn connect(&self, endpoint: &SocketEndpoint)
    -> Result<Arc<dyn LifecycleClient>, LifecycleError>;
}

/// Connector producing a JSONL [`SdkClient`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SdkConnector;

impl ClientConnector for SdkConnector {
    fn connect(
        &self,
        endpoint: &SocketEndpoint,
    ) -> Result<Arc<dyn LifecycleClient>, LifecycleError> {
        Ok(Arc::new(SdkClient::connect(endpoint)?))
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The lifecycle sidecar could not be reached.
    #[error("failed to connect to lifecycle sidecar: {source}")]
    Connect {
        /// Underlying lifecycle error.
        #[source]
        source: LifecycleError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Server {
    config: Config,
    client: Arc<dyn LifecycleClient>,
    telemetry: TelemetryHandle,
}

impl Server {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the connected lifecycle client.
    #[must_use]
    pub fn client(&self) -> Arc<dyn LifecycleClient> {
        Arc::clone(&self.client)
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Bootstraps the server using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration, telemetry or the sidecar
/// connection fails. Each failure is also passed to `reporter`.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn StatusReporter,
    connector: &dyn ClientConnector,
) -> Result<Server, BootstrapError> {
    reporter.bootstrap_starting();
    let result = bootstrap_inner(loader, connector);
    match &result {
        Ok(server) => reporter.bootstrap_succeeded(&server.config),
        Err(error) => reporter.bootstrap_failed(error),
    }
    result
}

fn bootstrap_inner(
    loader: &dyn ConfigLoader,
    connector: &dyn ClientConnector,
) -> Result<Server, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let client = connector
        .connect(config.sdk_endpoint())
        .map_err(|source| BootstrapError::Connect { source })?;
    Ok(Server {
        config,
        client,
        telemetry,
    })
}
