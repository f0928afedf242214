//! Test doubles for code that drives a [`LifecycleClient`].
//!
//! [`FakeSidecar`] speaks the real JSONL protocol on a loopback port so that
//! process-level tests can point a server binary at it. [`RecordingClient`]
//! implements the trait in memory for unit tests.

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use simple_tcp_config::SocketEndpoint;

use crate::{
    Condition, LifecycleClient, LifecycleError, SdkReply, SdkRequest, StateEvent, WatchStream,
};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    condition()
}

#[derive(Debug, Default)]
struct Rejections {
    ready: AtomicBool,
    health: AtomicBool,
    conditions: Mutex<HashSet<Condition>>,
}

impl Rejections {
    fn reason_for(&self, request: &SdkRequest) -> Option<String> {
        let rejected = match request {
            SdkRequest::Ready => self.ready.load(Ordering::SeqCst),
            SdkRequest::Health => self.health.load(Ordering::SeqCst),
            SdkRequest::SetCondition { condition, .. } => {
                lock(&self.conditions).contains(condition)
            }
            SdkRequest::Watch => false,
        };
        rejected.then(|| format!("{} refused by test sidecar", request.operation()))
    }
}

#[derive(Debug, Default)]
struct SidecarState {
    calls: Mutex<Vec<SdkRequest>>,
    stalled: AtomicBool,
    rejections: Rejections,
    watchers: Mutex<Vec<TcpStream>>,
}

/// Loopback sidecar that records requests and streams scripted notifications.
#[derive(Debug)]
pub struct FakeSidecar {
    address: SocketAddr,
    state: Arc<SidecarState>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakeSidecar {
    /// Binds an ephemeral loopback port and starts serving.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the port cannot be bound.
    pub fn start() -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        listener.set_nonblocking(true)?;
        let address = listener.local_addr()?;
        let state = Arc::new(SidecarState::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let state = Arc::clone(&state);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || accept_loop(&listener, &state, &shutdown))
        };
        Ok(Self {
            address,
            state,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Endpoint clients should connect to.
    #[must_use]
    pub fn endpoint(&self) -> SocketEndpoint {
        SocketEndpoint::tcp(self.address.ip().to_string(), self.address.port())
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<SdkRequest> {
        lock(&self.state.calls).clone()
    }

    /// Number of health pings received so far.
    #[must_use]
    pub fn health_pings(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SdkRequest::Health))
            .count()
    }

    /// Polls until `predicate` holds for the recorded calls or `timeout` elapses.
    pub fn wait_for_calls(
        &self,
        timeout: Duration,
        mut predicate: impl FnMut(&[SdkRequest]) -> bool,
    ) -> bool {
        wait_until(timeout, || predicate(&lock(&self.state.calls)))
    }

    /// Refuses subsequent `ready` requests.
    pub fn reject_ready(&self) {
        self.state.rejections.ready.store(true, Ordering::SeqCst);
    }

    /// Refuses subsequent health pings.
    pub fn reject_health(&self) {
        self.state.rejections.health.store(true, Ordering::SeqCst);
    }

    /// Refuses subsequent requests setting `condition`.
    pub fn reject_condition(&self, condition: Condition) {
        lock(&self.state.rejections.conditions).insert(condition);
    }

    /// Keeps recording requests but stops answering them.
    pub fn stall_replies(&self) {
        self.state.stalled.store(true, Ordering::SeqCst);
    }

    /// Answers requests again after [`Self::stall_replies`].
    pub fn resume_replies(&self) {
        self.state.stalled.store(false, Ordering::SeqCst);
    }

    /// Polls until at least `count` watch subscriptions are open.
    pub fn wait_for_watchers(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || lock(&self.state.watchers).len() >= count)
    }

    /// Sends `event` to every open watch subscription.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the event cannot be encoded or written.
    pub fn push_event(&self, event: &StateEvent) -> io::Result<()> {
        let mut line = serde_json::to_vec(event).map_err(io::Error::other)?;
        line.push(b'\n');
        for watcher in lock(&self.state.watchers).iter_mut() {
            watcher.write_all(&line)?;
            watcher.flush()?;
        }
        Ok(())
    }

    /// Ends every open watch subscription.
    pub fn close_watchers(&self) {
        for watcher in lock(&self.state.watchers).drain(..) {
            let _ = watcher.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for FakeSidecar {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.close_watchers();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn accept_loop(listener: &TcpListener, state: &Arc<SidecarState>, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let state = Arc::clone(state);
                thread::spawn(move || serve_connection(stream, &state));
            }
            Err(_) => thread::sleep(ACCEPT_BACKOFF),
        }
    }
}

fn serve_connection(stream: TcpStream, state: &SidecarState) {
    let Ok(reader) = stream.try_clone() else {
        return;
    };
    let mut writer = stream;
    for line in BufReader::new(reader).lines() {
        let Ok(line) = line else {
            return;
        };
        let (request, reply) = match serde_json::from_str::<SdkRequest>(&line) {
            Ok(request) => {
                lock(&state.calls).push(request.clone());
                let reply = state
                    .rejections
                    .reason_for(&request)
                    .map_or(SdkReply::Ok, |message| SdkReply::Error { message });
                (Some(request), reply)
            }
            Err(error) => (
                None,
                SdkReply::Error {
                    message: error.to_string(),
                },
            ),
        };
        if state.stalled.load(Ordering::SeqCst) {
            continue;
        }
        if write_reply(&mut writer, &reply).is_err() {
            return;
        }
        if matches!(request, Some(SdkRequest::Watch))
            && reply == SdkReply::Ok
            && let Ok(watcher) = writer.try_clone()
        {
            lock(&state.watchers).push(watcher);
        }
    }
}

fn write_reply(writer: &mut TcpStream, reply: &SdkReply) -> io::Result<()> {
    let mut line = serde_json::to_vec(reply).map_err(io::Error::other)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()
}

/// In-memory [`LifecycleClient`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<SdkRequest>>,
    rejections: Rejections,
    watch_feed: Mutex<Option<Receiver<Result<StateEvent, String>>>>,
    health_delay: Mutex<Option<Duration>>,
}

impl RecordingClient {
    /// Builds a client that accepts every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SdkRequest> {
        lock(&self.calls).clone()
    }

    /// Number of health pings received so far.
    #[must_use]
    pub fn health_pings(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SdkRequest::Health))
            .count()
    }

    /// Condition updates received so far, in order.
    #[must_use]
    pub fn conditions(&self) -> Vec<(Condition, bool)> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                SdkRequest::SetCondition { condition, value } => Some((*condition, *value)),
                _ => None,
            })
            .collect()
    }

    /// Polls until `predicate` holds for the recorded calls or `timeout` elapses.
    pub fn wait_for_calls(
        &self,
        timeout: Duration,
        mut predicate: impl FnMut(&[SdkRequest]) -> bool,
    ) -> bool {
        wait_until(timeout, || predicate(&lock(&self.calls)))
    }

    /// Fails subsequent `mark_ready` calls.
    pub fn reject_ready(&self) {
        self.rejections.ready.store(true, Ordering::SeqCst);
    }

    /// Fails subsequent health pings.
    pub fn reject_health(&self) {
        self.rejections.health.store(true, Ordering::SeqCst);
    }

    /// Holds each subsequent health ping for `delay` after recording it, as
    /// a sidecar that stops answering would.
    pub fn delay_health_pings(&self, delay: Duration) {
        *lock(&self.health_delay) = Some(delay);
    }

    /// Fails subsequent updates of `condition`.
    pub fn reject_condition(&self, condition: Condition) {
        lock(&self.rejections.conditions).insert(condition);
    }

    /// Arms the next [`LifecycleClient::watch`] call with a scripted feed.
    ///
    /// Events sent through the returned handle are delivered in order; an
    /// `Err` becomes a stream failure, and dropping the handle ends the
    /// stream.
    #[must_use]
    pub fn watch_feed(&self) -> Sender<Result<StateEvent, String>> {
        let (sender, receiver) = mpsc::channel();
        *lock(&self.watch_feed) = Some(receiver);
        sender
    }

    fn record(&self, request: SdkRequest) -> Result<(), LifecycleError> {
        let rejection = self.rejections.reason_for(&request);
        let operation = request.operation();
        lock(&self.calls).push(request);
        match rejection {
            Some(message) => Err(LifecycleError::Rejected { operation, message }),
            None => Ok(()),
        }
    }
}

impl LifecycleClient for RecordingClient {
    fn mark_ready(&self) -> Result<(), LifecycleError> {
        self.record(SdkRequest::Ready)
    }

    fn set_condition(&self, condition: Condition, value: bool) -> Result<(), LifecycleError> {
        self.record(SdkRequest::SetCondition { condition, value })
    }

    fn health_ping(&self) -> Result<(), LifecycleError> {
        let recorded = self.record(SdkRequest::Health);
        let delay = *lock(&self.health_delay);
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        recorded
    }

    fn watch(&self) -> Result<Box<dyn WatchStream>, LifecycleError> {
        self.record(SdkRequest::Watch)?;
        let receiver = lock(&self.watch_feed)
            .take()
            .ok_or_else(|| LifecycleError::Rejected {
                operation: "watch",
                message: "no watch feed armed".to_owned(),
            })?;
        Ok(Box::new(ScriptedWatch { receiver }))
    }
}

struct ScriptedWatch {
    receiver: Receiver<Result<StateEvent, String>>,
}

impl WatchStream for ScriptedWatch {
    fn next_event(&mut self) -> Result<Option<StateEvent>, LifecycleError> {
        match self.receiver.recv() {
            Ok(Ok(event)) => Ok(Some(event)),
            Ok(Err(message)) => Err(LifecycleError::Rejected {
                operation: "watch",
                message,
            }),
            Err(_) => Ok(None),
        }
    }
}
