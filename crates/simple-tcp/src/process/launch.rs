//! Supervises server launch sequencing and the shutdown path.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread;

use tracing::{error, info};

use crate::bootstrap::{
    ClientConnector, ConfigLoader, SdkConnector, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
use crate::dispatch::DispatchConnectionHandler;
use crate::signaling;
use crate::status::{StatusReporter, StructuredStatusReporter};
use crate::transport::SocketListener;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{
    ShutdownHandle, ShutdownReason, ShutdownSignal, SystemShutdownSignal, shutdown_channel,
};

/// Collaborators required to launch the server.
pub(crate) struct LaunchPlan<L, C, S> {
    pub(crate) loader: L,
    pub(crate) connector: C,
    pub(crate) signal: S,
    pub(crate) reporter: Arc<dyn StatusReporter>,
}

/// Runs the server using the production collaborators.
///
/// Returns once shutdown has been requested, with the reason that should
/// decide the process exit code.
///
/// # Errors
///
/// Returns [`LaunchError`] when the server cannot start.
pub fn run_server() -> Result<ShutdownReason, LaunchError> {
    run_server_with(LaunchPlan {
        loader: SystemConfigLoader,
        connector: SdkConnector,
        signal: SystemShutdownSignal,
        reporter: Arc::new(StructuredStatusReporter::new()),
    })
}

/// Runs the server with injected collaborators.
pub(crate) fn run_server_with<L, C, S>(
    plan: LaunchPlan<L, C, S>,
) -> Result<ShutdownReason, LaunchError>
where
    L: ConfigLoader,
    C: ClientConnector,
    S: ShutdownSignal + 'static,
{
    let LaunchPlan {
        loader,
        connector,
        signal,
        reporter,
    } = plan;

    let config = loader.load()?;
    let server = bootstrap_with(
        &StaticConfigLoader::new(config.clone()),
        reporter.as_ref(),
        &connector,
    )?;
    info!(
        target: PROCESS_TARGET,
        version = crate::VERSION,
        "starting server runtime"
    );
    let listener = SocketListener::bind(&config.listen_endpoint())?;
    let client = server.client();
    let (shutdown, requests) = shutdown_channel();

    let signaling = signaling::start(&config, Arc::clone(&client), shutdown.clone())?;
    if let Err(source) = client.mark_ready() {
        signaling.stop();
        return Err(LaunchError::Ready { source });
    }
    info!(target: PROCESS_TARGET, "server marked ready");

    let handler = Arc::new(DispatchConnectionHandler::new(
        client,
        signaling.health_cancellation(),
        shutdown.clone(),
        config.protocol_policy(),
    ));
    let addr = listener.local_addr();
    let listener_handle = match listener.start(handler) {
        Ok(handle) => handle,
        Err(error) => {
            signaling.stop();
            return Err(error.into());
        }
    };
    if let Some(addr) = addr {
        reporter.listening(addr);
    }
    watch_signals(signal, shutdown);

    let reason = await_shutdown(&requests);
    reporter.stopping(&reason);
    listener_handle.shutdown();
    let joined = listener_handle.join();
    signaling.stop();
    joined?;
    info!(
        target: PROCESS_TARGET,
        code = reason.exit_code(),
        "shutdown sequence completed"
    );
    Ok(reason)
}

fn watch_signals<S>(signal: S, shutdown: ShutdownHandle)
where
    S: ShutdownSignal + 'static,
{
    thread::spawn(move || match signal.wait() {
        Ok(name) => shutdown.request(ShutdownReason::Signal(name)),
        Err(error) => {
            error!(target: PROCESS_TARGET, %error, "signal listener failed");
            shutdown.request(ShutdownReason::Fatal(error.to_string()));
        }
    });
}

fn await_shutdown(requests: &Receiver<ShutdownReason>) -> ShutdownReason {
    requests
        .recv()
        .unwrap_or_else(|_| ShutdownReason::Fatal("shutdown channel closed".to_owned()))
}
