//! Test doubles and common utilities for controller contract tests
//!
//! The doubles only record the commands the controller issues. Tests play
//! the part of the host services by feeding events back by hand.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tcpget_core::{
    AcquisitionConfig, AcquisitionController, ConnectionId, EndpointConfig, Error, Event,
    ExtractionResults, ExtractionRule, FieldExtractor, Hooks, ReplyOutcome, Resolver, TimerId,
    TimerService, Transport,
};

/// A command issued by the controller to one of its collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resolve(String),
    Connect(SocketAddrV4, ConnectionId),
    Send(ConnectionId, Vec<u8>),
    Disconnect(ConnectionId),
    Arm(TimerId, Duration, bool),
    Disarm(TimerId),
}

/// Shared, ordered log of collaborator calls
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn resolves(&self) -> usize {
        self.count(|c| matches!(c, Call::Resolve(_)))
    }

    pub fn connects(&self) -> usize {
        self.count(|c| matches!(c, Call::Connect(..)))
    }

    pub fn disconnects(&self) -> usize {
        self.count(|c| matches!(c, Call::Disconnect(_)))
    }

    /// Arms of any timer of the same kind as `timer`
    pub fn arms(&self, timer: TimerId) -> usize {
        self.count(|c| matches!(c, Call::Arm(t, ..) if same_kind(*t, timer)))
    }

    /// Disarms of any timer of the same kind as `timer`
    pub fn disarms(&self, timer: TimerId) -> usize {
        self.count(|c| matches!(c, Call::Disarm(t) if same_kind(*t, timer)))
    }

    /// Most recently armed DNS watchdog
    pub fn last_watchdog(&self) -> TimerId {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Arm(t @ TimerId::DnsWatchdog(_), ..) => Some(*t),
                _ => None,
            })
            .expect("no watchdog armed")
    }

    /// Connection id handed out by the most recent connect
    pub fn last_connection(&self) -> ConnectionId {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Connect(_, id) => Some(*id),
                _ => None,
            })
            .expect("no connect issued")
    }

    /// Payload of the most recent send
    pub fn last_sent(&self) -> Vec<u8> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Send(_, data) => Some(data.clone()),
                _ => None,
            })
            .expect("no send issued")
    }
}

fn same_kind(a: TimerId, b: TimerId) -> bool {
    std::mem::discriminant(&a) == std::mem::discriminant(&b)
}

/// Any DNS watchdog, for counting with [`CallLog::arms`]
pub const WATCHDOG: TimerId = TimerId::DnsWatchdog(0);

pub struct RecordingResolver {
    log: CallLog,
}

impl Resolver for RecordingResolver {
    fn resolve(&mut self, hostname: &str) -> Result<(), Error> {
        self.log.push(Call::Resolve(hostname.to_string()));
        Ok(())
    }
}

pub struct RecordingTransport {
    log: CallLog,
    next_id: u64,
    fail_send: bool,
}

impl Transport for RecordingTransport {
    fn connect(&mut self, remote: SocketAddrV4) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        self.log.push(Call::Connect(remote, id));
        id
    }

    fn send(&mut self, connection: ConnectionId, data: &[u8]) -> Result<(), Error> {
        self.log.push(Call::Send(connection, data.to_vec()));
        if self.fail_send {
            return Err(Error::transport("send buffer full"));
        }
        Ok(())
    }

    fn disconnect(&mut self, connection: ConnectionId) -> Result<(), Error> {
        self.log.push(Call::Disconnect(connection));
        Ok(())
    }
}

pub struct RecordingTimers {
    log: CallLog,
}

impl TimerService for RecordingTimers {
    fn arm(&mut self, timer: TimerId, period: Duration, repeating: bool) {
        self.log.push(Call::Arm(timer, period, repeating));
    }

    fn disarm(&mut self, timer: TimerId) {
        self.log.push(Call::Disarm(timer));
    }
}

/// What the data-ready hook was called with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Complete(ExtractionResults),
    TimedOut,
    Closed,
}

/// Everything the caller-side hooks observed
#[derive(Debug, Clone, Default)]
pub struct Observed {
    pub resolved: Arc<Mutex<Vec<Option<Ipv4Addr>>>>,
    pub outcomes: Arc<Mutex<Vec<Outcome>>>,
    pub connects: Arc<Mutex<Vec<ConnectionId>>>,
    pub disconnects: Arc<Mutex<Vec<ConnectionId>>>,
    pub sends: Arc<Mutex<Vec<ConnectionId>>>,
    pub received: Arc<Mutex<Vec<Vec<u8>>>>,
    pub connect_failures: Arc<Mutex<Vec<String>>>,
    pub send_failures: Arc<Mutex<Vec<String>>>,
}

impl Observed {
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn resolved(&self) -> Vec<Option<Ipv4Addr>> {
        self.resolved.lock().unwrap().clone()
    }

    fn hooks(&self) -> Hooks {
        let outcomes = Arc::clone(&self.outcomes);
        let connects = Arc::clone(&self.connects);
        let disconnects = Arc::clone(&self.disconnects);
        let sends = Arc::clone(&self.sends);
        let received = Arc::clone(&self.received);
        let connect_failures = Arc::clone(&self.connect_failures);
        let send_failures = Arc::clone(&self.send_failures);

        Hooks::new()
            .with_connect(move |c| connects.lock().unwrap().push(c))
            .with_disconnect(move |c| disconnects.lock().unwrap().push(c))
            .with_send(move |c| sends.lock().unwrap().push(c))
            .with_receive(move |_, data| received.lock().unwrap().push(data.to_vec()))
            .with_connect_failed(move |_, e| connect_failures.lock().unwrap().push(e.to_string()))
            .with_send_failed(move |_, e| send_failures.lock().unwrap().push(e.to_string()))
            .with_data_ready(move |outcome| {
                let outcome = match outcome {
                    ReplyOutcome::Complete(results) => Outcome::Complete(results.clone()),
                    ReplyOutcome::TimedOut => Outcome::TimedOut,
                    ReplyOutcome::Closed => Outcome::Closed,
                };
                outcomes.lock().unwrap().push(outcome);
            })
    }
}

/// A controller wired to recording doubles
pub struct Harness {
    pub controller: AcquisitionController,
    pub log: CallLog,
    pub observed: Observed,
}

impl Harness {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self::build(config, false)
    }

    pub fn with_failing_send(config: AcquisitionConfig) -> Self {
        Self::build(config, true)
    }

    fn build(config: AcquisitionConfig, fail_send: bool) -> Self {
        let log = CallLog::default();
        let observed = Observed::default();

        let mut controller = AcquisitionController::new(
            config,
            Box::new(RecordingResolver { log: log.clone() }),
            Box::new(RecordingTransport {
                log: log.clone(),
                next_id: 0,
                fail_send,
            }),
            Box::new(RecordingTimers { log: log.clone() }),
        )
        .expect("controller construction succeeds");

        controller.set_hooks(observed.hooks());
        controller.set_extractor(temp_extractor());

        Self {
            controller,
            log,
            observed,
        }
    }

    /// Start resolution, recording the callback argument
    pub fn resolve(&mut self) {
        let resolved = Arc::clone(&self.observed.resolved);
        self.controller
            .resolve_host_name(move |addr| resolved.lock().unwrap().push(addr))
            .expect("resolution issued");
    }

    pub fn event(&mut self, event: Event) {
        self.controller.handle_event(event);
    }

    /// Expire the watchdog of the current DNS attempt
    pub fn expire_watchdog(&mut self) {
        let watchdog = self.log.last_watchdog();
        self.event(Event::TimerFired(watchdog));
    }

    /// Resolve a literal endpoint and start acquisition
    pub fn started(config: AcquisitionConfig) -> Self {
        let mut harness = Self::new(config);
        harness.resolve();
        harness
            .controller
            .start_data_acquisition()
            .expect("acquisition starts");
        harness
    }

    /// Drive the current connection up to `AwaitingReply`
    pub fn connect_and_send(&mut self) -> ConnectionId {
        let conn = self.log.last_connection();
        self.event(Event::Connected(conn));
        self.event(Event::Sent(conn));
        conn
    }

    pub fn receive(&mut self, conn: ConnectionId, data: &[u8]) {
        self.event(Event::Received {
            connection: conn,
            data: data.to_vec(),
        });
    }
}

pub const REPLY: &[u8] = b"HTTP/1.1 200 OK\r\nTEMP:23.5,HUM:60\r\n\r\n";

pub fn temp_extractor() -> FieldExtractor {
    FieldExtractor::new(
        "\r\n\r\n",
        vec![
            ExtractionRule::delimited("temp", "TEMP:", 0, ','),
            ExtractionRule::fixed("hum", "HUM:", 0, 2),
        ],
    )
    .expect("valid rules")
}

/// Endpoint with a literal address, no DNS involved
pub fn literal_config() -> AcquisitionConfig {
    AcquisitionConfig::new(EndpointConfig::with_address("192.168.1.50", 8080, "/sensor", 10_000))
}

/// Endpoint that needs DNS
pub fn hostname_config() -> AcquisitionConfig {
    AcquisitionConfig::new(EndpointConfig::with_hostname("sensor.example.com", 80, "/data", 10_000))
}
