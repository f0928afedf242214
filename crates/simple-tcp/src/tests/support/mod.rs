//! Test harness utilities for the server behavioural suites.

mod config_loader;
mod connector;
mod process_world;
mod reporter;
mod world;

pub use config_loader::TestConfigLoader;
pub use connector::RecordingConnector;
pub use process_world::{POLL_INTERVAL, ProcessTestWorld, StepResult, WAIT_TIMEOUT};
pub use reporter::{RecordingStatusReporter, StatusEvent};
pub use world::{TestWorld, world};
