//! World shared by the bootstrap scenarios.

use std::cell::RefCell;
use std::sync::Arc;

use crate::bootstrap::{BootstrapError, ConfigLoader, Server, bootstrap_with};

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::connector::RecordingConnector;
use super::reporter::RecordingStatusReporter;

pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingStatusReporter>,
    pub connector: RecordingConnector,
    outcome: Option<Result<Server, BootstrapError>>,
}

impl TestWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingStatusReporter::default()),
            connector: RecordingConnector::default(),
            outcome: None,
        }
    }

    /// Replaces the loader and forgets any earlier bootstrap result.
    pub fn use_loader(&mut self, loader: impl ConfigLoader + 'static) {
        self.loader = Box::new(loader);
        self.outcome = None;
    }

    pub fn use_failing_loader(&mut self) {
        self.use_loader(FailingConfigLoader);
    }

    /// Runs bootstrap unless a result is already recorded.
    pub fn bootstrap(&mut self) {
        if self.outcome.is_none() {
            self.outcome = Some(bootstrap_with(
                self.loader.as_ref(),
                self.reporter.as_ref(),
                &self.connector,
            ));
        }
    }

    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.outcome.as_ref().and_then(|outcome| outcome.as_ref().err())
    }

    #[must_use]
    pub fn server(&self) -> Option<&Server> {
        self.outcome.as_ref().and_then(|outcome| outcome.as_ref().ok())
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
