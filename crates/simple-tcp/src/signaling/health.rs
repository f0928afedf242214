//! Periodic health pings until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use lifecycle_client::LifecycleClient;

use crate::process::shutdown::{ShutdownHandle, ShutdownReason};

use super::SIGNALING_TARGET;
use super::cancel::CancellationToken;

pub(super) fn run(
    client: &Arc<dyn LifecycleClient>,
    interval: Duration,
    token: &CancellationToken,
    shutdown: &ShutdownHandle,
) {
    info!(
        target: SIGNALING_TARGET,
        interval_ms = interval.as_millis(),
        "starting health pings"
    );
    while !token.is_cancelled() {
        if let Err(source) = client.health_ping() {
            error!(target: SIGNALING_TARGET, error = %source, "health ping failed");
            shutdown.request(ShutdownReason::Fatal(format!("health ping failed: {source}")));
            return;
        }
        debug!(target: SIGNALING_TARGET, "health ping sent");
        if token.wait_timeout(interval) {
            break;
        }
    }
    info!(target: SIGNALING_TARGET, "stopped health pings");
}

#[cfg(test)]
mod tests {
    use std::thread;

    use lifecycle_client::testing::RecordingClient;
    use rstest::rstest;

    use crate::process::shutdown::shutdown_channel;

    use super::*;

    const INTERVAL: Duration = Duration::from_millis(20);
    const TIMEOUT: Duration = Duration::from_secs(2);

    #[rstest]
    fn pings_immediately_and_repeatedly_until_cancelled() {
        let recorder = Arc::new(RecordingClient::new());
        let client: Arc<dyn LifecycleClient> = recorder.clone();
        let token = CancellationToken::new();
        let (shutdown, receiver) = shutdown_channel();
        let pinger = {
            let token = token.clone();
            thread::spawn(move || run(&client, INTERVAL, &token, &shutdown))
        };

        assert!(recorder.wait_for_calls(TIMEOUT, |calls| calls.len() >= 3));
        token.cancel();
        pinger.join().expect("pinger thread");
        let settled = recorder.health_pings();
        thread::sleep(INTERVAL * 3);
        assert_eq!(recorder.health_pings(), settled);
        assert!(receiver.try_recv().is_err(), "no shutdown expected");
    }

    #[rstest]
    fn cancelled_token_sends_no_pings() {
        let recorder = Arc::new(RecordingClient::new());
        let client: Arc<dyn LifecycleClient> = recorder.clone();
        let token = CancellationToken::new();
        token.cancel();
        let (shutdown, _receiver) = shutdown_channel();

        run(&client, INTERVAL, &token, &shutdown);

        assert_eq!(recorder.health_pings(), 0);
    }

    #[rstest]
    fn ping_failure_requests_fatal_shutdown() {
        let recorder = Arc::new(RecordingClient::new());
        recorder.reject_health();
        let client: Arc<dyn LifecycleClient> = recorder.clone();
        let (shutdown, receiver) = shutdown_channel();

        run(&client, INTERVAL, &CancellationToken::new(), &shutdown);

        let reason = receiver.recv_timeout(TIMEOUT).expect("shutdown reason");
        assert!(
            matches!(&reason, ShutdownReason::Fatal(message) if message.contains("health ping")),
            "unexpected reason: {reason:?}"
        );
        assert_eq!(recorder.health_pings(), 1);
    }
}
