//! Reacts to an out-of-service notification by retiring the server.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use lifecycle_client::{Condition, LifecycleClient, LifecycleError};

use crate::process::shutdown::{ShutdownHandle, ShutdownReason};

use super::SIGNALING_TARGET;
use super::cancel::CancellationToken;

pub(super) fn run(
    client: &Arc<dyn LifecycleClient>,
    grace: Duration,
    token: &CancellationToken,
    shutdown: &ShutdownHandle,
) {
    match watch_until_retired(client.as_ref(), grace, token) {
        Ok(WatchOutcome::Retired) => {
            info!(target: SIGNALING_TARGET, "server retired");
            shutdown.request(ShutdownReason::Retired);
        }
        Ok(WatchOutcome::Interrupted) => debug!(target: SIGNALING_TARGET, "watch stopped"),
        Err(message) => {
            error!(target: SIGNALING_TARGET, error = %message, "watch failed");
            shutdown.request(ShutdownReason::Fatal(message));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchOutcome {
    Retired,
    Interrupted,
}

fn watch_until_retired(
    client: &dyn LifecycleClient,
    grace: Duration,
    token: &CancellationToken,
) -> Result<WatchOutcome, String> {
    let mut stream = client
        .watch()
        .map_err(|error| format!("failed to open watch: {error}"))?;
    info!(target: SIGNALING_TARGET, "watching lifecycle state");
    loop {
        let event = stream.next_event();
        if token.is_cancelled() {
            return Ok(WatchOutcome::Interrupted);
        }
        match event {
            Ok(Some(event)) if event.is_out_of_service() => break,
            Ok(Some(event)) => {
                debug!(
                    target: SIGNALING_TARGET,
                    constraints = event.constraints.len(),
                    "state notification"
                );
            }
            Ok(None) => return Err("watch stream ended".to_owned()),
            Err(error) => return Err(format!("watch stream failed: {error}")),
        }
    }

    info!(
        target: SIGNALING_TARGET,
        grace_ms = grace.as_millis(),
        "out of service; retiring after grace period"
    );
    if token.wait_timeout(grace) {
        return Ok(WatchOutcome::Interrupted);
    }
    retire(client).map_err(|error| format!("failed to retire: {error}"))?;
    Ok(WatchOutcome::Retired)
}

fn retire(client: &dyn LifecycleClient) -> Result<(), LifecycleError> {
    client.set_condition(Condition::HasNoPlayer, true)?;
    client.set_condition(Condition::Retired, true)
}
