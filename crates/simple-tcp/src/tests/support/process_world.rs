//! Process supervision test world shared across BDD scenarios.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lifecycle_client::StateEvent;

use crate::process::launch::{LaunchPlan, run_server_with};
use crate::process::{LaunchError, ShutdownError, ShutdownReason, ShutdownSignal};
use crate::status::StatusReporter;

use super::config_loader::TestConfigLoader;
use super::connector::RecordingConnector;
use super::reporter::RecordingStatusReporter;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub type StepResult = Result<(), String>;
type RunResult = Result<ShutdownReason, LaunchError>;

/// Signal source the test triggers by hand.
#[derive(Debug, Clone, Default)]
pub struct TestShutdownSignal {
    state: Arc<(Mutex<Option<String>>, Condvar)>,
}

impl TestShutdownSignal {
    pub fn trigger(&self, name: &str) {
        let (slot, ready) = &*self.state;
        let mut signal = slot.lock().expect("signal mutex poisoned");
        signal.get_or_insert_with(|| name.to_owned());
        ready.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<String, ShutdownError> {
        let (slot, ready) = &*self.state;
        let mut signal = slot.lock().map_err(|_| ShutdownError::Closed)?;
        loop {
            if let Some(name) = signal.clone() {
                return Ok(name);
            }
            signal = ready.wait(signal).map_err(|_| ShutdownError::Closed)?;
        }
    }
}

/// One client connection to the running server.
pub struct ClientConnection {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl ClientConnection {
    fn open(addr: SocketAddr) -> Result<Self, String> {
        let writer = TcpStream::connect(addr).map_err(|error| error.to_string())?;
        writer
            .set_read_timeout(Some(WAIT_TIMEOUT))
            .map_err(|error| error.to_string())?;
        let reader = BufReader::new(writer.try_clone().map_err(|error| error.to_string())?);
        Ok(Self { writer, reader })
    }

    pub fn send(&mut self, line: &str) -> Result<(), String> {
        writeln!(self.writer, "{line}").map_err(|error| error.to_string())
    }

    pub fn read_reply(&mut self) -> Result<String, String> {
        let mut reply = String::new();
        let read = self
            .reader
            .read_line(&mut reply)
            .map_err(|error| error.to_string())?;
        if read == 0 {
            return Err("connection closed before reply".to_owned());
        }
        Ok(reply.trim_end_matches('\n').to_owned())
    }
}

pub struct ProcessTestWorld {
    pub loader: TestConfigLoader,
    pub reporter: Arc<RecordingStatusReporter>,
    pub connector: RecordingConnector,
    signal: TestShutdownSignal,
    handle: Option<JoinHandle<RunResult>>,
    result: Option<RunResult>,
    connections: Vec<ClientConnection>,
    replies: Vec<String>,
    watch_feed: Option<Sender<Result<StateEvent, String>>>,
    pings_at_mark: usize,
    reserved: Option<TcpListener>,
}

impl Default for ProcessTestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTestWorld {
    pub fn new() -> Self {
        Self {
            loader: TestConfigLoader::new(),
            reporter: Arc::new(RecordingStatusReporter::default()),
            connector: RecordingConnector::default(),
            signal: TestShutdownSignal::default(),
            handle: None,
            result: None,
            connections: Vec::new(),
            replies: Vec::new(),
            watch_feed: None,
            pings_at_mark: 0,
            reserved: None,
        }
    }

    /// Arms the sidecar's watch stream; call before starting the server.
    pub fn arm_watch(&mut self) {
        self.watch_feed = Some(self.connector.client().watch_feed());
    }

    /// Binds a loopback port and points the server at it while it is held.
    pub fn reserve_listen_port(&mut self) -> StepResult {
        let reserved = TcpListener::bind(("127.0.0.1", 0)).map_err(|error| error.to_string())?;
        let port = reserved
            .local_addr()
            .map_err(|error| error.to_string())?
            .port();
        self.loader.set_listen_endpoint("127.0.0.1", port);
        self.reserved = Some(reserved);
        Ok(())
    }

    pub fn push_watch_event(&self, event: StateEvent) -> StepResult {
        let feed = self
            .watch_feed
            .as_ref()
            .ok_or_else(|| "watch feed not armed".to_owned())?;
        feed.send(Ok(event)).map_err(|error| error.to_string())
    }

    pub fn start(&mut self) -> StepResult {
        if self.handle.is_some() || self.result.is_some() {
            return Err("server already started".to_owned());
        }
        let plan = LaunchPlan {
            loader: self.loader.clone(),
            connector: self.connector.clone(),
            signal: self.signal.clone(),
            reporter: self.reporter.clone() as Arc<dyn StatusReporter>,
        };
        self.handle = Some(thread::spawn(move || run_server_with(plan)));
        Ok(())
    }

    /// Blocks until the listener reports its address or the run ends early.
    pub fn wait_for_listening(&mut self) -> Result<SocketAddr, String> {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Some(addr) = self.reporter.listening_addr() {
                return Ok(addr);
            }
            if self.handle.as_ref().is_some_and(JoinHandle::is_finished) {
                self.join()?;
                return Err(format!("server stopped during startup: {:?}", self.result));
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err("server did not start listening".to_owned())
    }

    pub fn connect(&mut self) -> Result<usize, String> {
        let addr = self.wait_for_listening()?;
        self.connections.push(ClientConnection::open(addr)?);
        Ok(self.connections.len() - 1)
    }

    pub fn connection(&mut self, index: usize) -> Result<&mut ClientConnection, String> {
        while self.connections.len() <= index {
            self.connect()?;
        }
        self.connections
            .get_mut(index)
            .ok_or_else(|| format!("no connection {index}"))
    }

    pub fn request(&mut self, index: usize, line: &str) -> StepResult {
        let connection = self.connection(index)?;
        connection.send(line)?;
        let reply = connection.read_reply()?;
        self.replies.push(reply);
        Ok(())
    }

    pub fn send_only(&mut self, index: usize, line: &str) -> StepResult {
        self.connection(index)?.send(line)
    }

    /// Sends a request on an existing connection and fails if it is answered.
    pub fn expect_closed(&mut self, index: usize) -> StepResult {
        let connection = self
            .connections
            .get_mut(index)
            .ok_or_else(|| format!("no connection {index}"))?;
        // A write to a closed peer may fail or be silently discarded.
        let _ = connection.send("VERSION");
        match connection.read_reply() {
            Ok(reply) => Err(format!("connection {index} still answered: {reply}")),
            Err(_) => Ok(()),
        }
    }

    pub fn last_reply(&self) -> Option<&str> {
        self.replies.last().map(String::as_str)
    }

    pub fn replies(&self) -> &[String] {
        &self.replies
    }

    pub fn trigger_signal(&self, name: &str) {
        self.signal.trigger(name);
    }

    /// Waits for the server run to end and records its result.
    pub fn join(&mut self) -> StepResult {
        if self.result.is_some() {
            return Ok(());
        }
        let handle = self
            .handle
            .take()
            .ok_or_else(|| "server not started".to_owned())?;
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                self.handle = Some(handle);
                return Err("server did not stop".to_owned());
            }
            thread::sleep(POLL_INTERVAL);
        }
        let result = handle
            .join()
            .map_err(|_| "server thread panicked".to_owned())?;
        self.result = Some(result);
        Ok(())
    }

    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    /// Remembers the current ping count for later comparison.
    pub fn mark_health_pings(&mut self) {
        self.pings_at_mark = self.connector.client().health_pings();
    }

    pub fn pings_at_mark(&self) -> usize {
        self.pings_at_mark
    }
}

impl Drop for ProcessTestWorld {
    fn drop(&mut self) {
        self.trigger_signal("teardown");
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
