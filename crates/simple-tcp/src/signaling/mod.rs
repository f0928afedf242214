//! Background lifecycle signalling.
//!
//! Exactly one strategy runs per process: periodic health pings, stoppable
//! through a [`CancellationToken`], or a watch on external state that
//! retires the server once it is taken out of service.

mod cancel;
mod health;
mod watch;

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use lifecycle_client::LifecycleClient;
use simple_tcp_config::{Config, SignalingStrategy};

use crate::process::shutdown::ShutdownHandle;

pub(crate) use self::cancel::CancellationToken;

const SIGNALING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::signaling");

const STOP_GRACE: Duration = Duration::from_millis(500);
const STOP_POLL: Duration = Duration::from_millis(5);

/// Errors raised while starting the signalling task.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// The background thread could not be spawned.
    #[error("failed to spawn {strategy} thread: {source}")]
    Spawn {
        /// Strategy that failed to start.
        strategy: SignalingStrategy,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Handle to the running signalling thread.
pub(crate) struct SignalingTask {
    strategy: SignalingStrategy,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SignalingTask {
    /// Token the dispatcher fires on `UNHEALTHY`; only present for health pings.
    pub(crate) fn health_cancellation(&self) -> Option<CancellationToken> {
        matches!(self.strategy, SignalingStrategy::HealthPing).then(|| self.token.clone())
    }

    /// Fires the cancellation signal and gives the pinger `STOP_GRACE` to
    /// finish.
    ///
    /// A pinger stuck in a sidecar call, and a watch blocked on the sidecar
    /// stream, cannot be interrupted, so those threads are left to end with
    /// the process.
    pub(crate) fn stop(mut self) {
        self.token.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.strategy == SignalingStrategy::Watch {
            debug!(target: SIGNALING_TARGET, "detaching watch thread");
            return;
        }
        let deadline = Instant::now() + STOP_GRACE;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    target: SIGNALING_TARGET,
                    grace_ms = STOP_GRACE.as_millis(),
                    "health pinger still busy; detaching"
                );
                return;
            }
            thread::sleep(STOP_POLL);
        }
        if handle.join().is_err() {
            warn!(target: SIGNALING_TARGET, "health ping thread panicked");
        }
    }
}

/// Starts the configured strategy on a background thread.
pub(crate) fn start(
    config: &Config,
    client: Arc<dyn LifecycleClient>,
    shutdown: ShutdownHandle,
) -> Result<SignalingTask, SignalingError> {
    let strategy = config.signaling();
    let token = CancellationToken::new();
    let worker = token.clone();
    let builder = thread::Builder::new().name(strategy.to_string());
    let spawned = match strategy {
        SignalingStrategy::HealthPing => {
            let interval = config.health_interval;
            builder.spawn(move || health::run(&client, interval, &worker, &shutdown))
        }
        SignalingStrategy::Watch => {
            let grace = config.watch_grace;
            builder.spawn(move || watch::run(&client, grace, &worker, &shutdown))
        }
    };
    let handle = spawned.map_err(|source| SignalingError::Spawn { strategy, source })?;
    Ok(SignalingTask {
        strategy,
        token,
        handle: Some(handle),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, mpsc};

    use lifecycle_client::testing::RecordingClient;
    use lifecycle_client::{Condition, LifecycleError, WatchStream};
    use rstest::rstest;

    use crate::process::shutdown::shutdown_channel;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn config(strategy: SignalingStrategy) -> Config {
        Config {
            signaling: strategy,
            health_interval: Duration::from_millis(20),
            watch_grace: Duration::from_millis(10),
            ..Config::default()
        }
    }

    #[rstest]
    fn health_strategy_exposes_token_and_stops_cleanly() {
        let recorder = Arc::new(RecordingClient::new());
        let (shutdown, _receiver) = shutdown_channel();
        let task = start(&config(SignalingStrategy::HealthPing), recorder.clone(), shutdown)
            .expect("start pinger");

        assert!(task.health_cancellation().is_some());
        assert!(recorder.wait_for_calls(TIMEOUT, |calls| !calls.is_empty()));
        task.stop();
        let settled = recorder.health_pings();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(recorder.health_pings(), settled);
    }

    #[rstest]
    fn watch_strategy_has_no_health_token() {
        let recorder = Arc::new(RecordingClient::new());
        let feed = recorder.watch_feed();
        let (shutdown, _receiver) = shutdown_channel();
        let task = start(&config(SignalingStrategy::Watch), recorder.clone(), shutdown)
            .expect("start watch");

        assert!(task.health_cancellation().is_none());
        assert!(recorder.wait_for_calls(TIMEOUT, |calls| !calls.is_empty()));
        assert_eq!(recorder.health_pings(), 0);
        task.stop();
        drop(feed);
    }

    /// Sidecar whose health pings never return within a test run.
    struct StalledPinger {
        started: Mutex<Option<mpsc::Sender<()>>>,
    }

    impl LifecycleClient for StalledPinger {
        fn mark_ready(&self) -> Result<(), LifecycleError> {
            Ok(())
        }

        fn set_condition(&self, _: Condition, _: bool) -> Result<(), LifecycleError> {
            Ok(())
        }

        fn health_ping(&self) -> Result<(), LifecycleError> {
            if let Some(started) = self.started.lock().ok().and_then(|mut slot| slot.take()) {
                let _ = started.send(());
            }
            std::thread::sleep(Duration::from_secs(60));
            Ok(())
        }

        fn watch(&self) -> Result<Box<dyn WatchStream>, LifecycleError> {
            Err(LifecycleError::Poisoned)
        }
    }

    #[rstest]
    fn stop_returns_while_a_health_ping_is_in_flight() {
        let (started, ping_started) = mpsc::channel();
        let client = Arc::new(StalledPinger {
            started: Mutex::new(Some(started)),
        });
        let (shutdown, _receiver) = shutdown_channel();
        let task = start(&config(SignalingStrategy::HealthPing), client, shutdown)
            .expect("start pinger");
        ping_started.recv_timeout(TIMEOUT).expect("ping started");

        let stopping = Instant::now();
        task.stop();

        assert!(
            stopping.elapsed() < TIMEOUT,
            "stop blocked for {:?}",
            stopping.elapsed()
        );
    }
}
