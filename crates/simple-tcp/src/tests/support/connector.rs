//! Connector handing out an in-memory lifecycle client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lifecycle_client::testing::RecordingClient;
use lifecycle_client::{LifecycleClient, LifecycleError};
use simple_tcp_config::SocketEndpoint;

use crate::bootstrap::ClientConnector;

/// Returns a shared [`RecordingClient`], or fails when told to.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    client: Arc<RecordingClient>,
    unreachable: Arc<AtomicBool>,
}

impl RecordingConnector {
    /// The client handed to the server.
    #[must_use]
    pub fn client(&self) -> Arc<RecordingClient> {
        Arc::clone(&self.client)
    }

    /// Makes subsequent connection attempts fail.
    pub fn make_unreachable(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }
}

impl ClientConnector for RecordingConnector {
    fn connect(
        &self,
        endpoint: &SocketEndpoint,
    ) -> Result<Arc<dyn LifecycleClient>, LifecycleError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(LifecycleError::Connect {
                endpoint: endpoint.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        Ok(self.client())
    }
}
