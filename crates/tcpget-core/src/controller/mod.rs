//! Acquisition controller
//!
//! The AcquisitionController is responsible for:
//! - Resolving the host name (with watchdog-bounded retries)
//! - Driving one connect → send → receive → disconnect cycle per tick
//! - Handing reply chunks to the [`FieldExtractor`]
//! - Bounding each reply with a timeout
//! - Reporting outcomes through caller [`Hooks`]
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐ ┌───────────┐ ┌──────────────┐
//! │ Resolver │ │ Transport │ │ TimerService │
//! └──────────┘ └───────────┘ └──────────────┘
//!       │            │              │
//!       └────── Event queue ────────┘
//!                    │
//!                    ▼
//!       ┌─────────────────────────┐        ┌────────────────┐
//!       │  AcquisitionController  │───────▶│ FieldExtractor │
//!       └─────────────────────────┘        └────────────────┘
//!                    │
//!                    ▼
//!                  Hooks
//! ```
//!
//! ## Cycle
//!
//! ```text
//! Idle → ResolvingDns → DnsResolved → Connecting → RequestSent → AwaitingReply
//!      → {ReplyReceived | Error} → Connecting (next tick)
//! ```
//!
//! Only the repeating acquisition timer starts a new connect. A tick that
//! lands while the previous connection has not yet reported `Disconnected`
//! is skipped.

mod state;

pub use state::LifecycleState;

use crate::config::{AcquisitionConfig, EndpointConfig};
use crate::error::{Error, Result};
use crate::event::{ConnectionId, Event, EventReceiver, TimerId};
use crate::extract::{ExtractionResults, FieldExtractor};
use crate::hooks::{Hooks, ReplyOutcome};
use crate::request::RequestTemplate;
use crate::traits::{Resolver, TimerService, Transport};
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

/// Callback receiving the outcome of [`AcquisitionController::resolve_host_name`]
pub type ResolvedCallback = Box<dyn FnMut(Option<Ipv4Addr>) + Send>;

/// Periodic single-connection GET client
///
/// ## Lifecycle
///
/// 1. Create with [`AcquisitionController::new()`]
/// 2. Configure rules ([`set_extractor`](Self::set_extractor)) and
///    [`Hooks`]
/// 3. [`resolve_host_name()`](Self::resolve_host_name), then
///    [`start_data_acquisition()`](Self::start_data_acquisition)
///    (or set `auto_start`)
/// 4. Feed events with [`handle_event()`](Self::handle_event) or
///    [`run()`](Self::run)
///
/// ## Threading
///
/// All events are processed one at a time on the caller's task. Nothing is
/// shared; the controller is a plain owned value.
pub struct AcquisitionController {
    config: AcquisitionConfig,

    resolver: Box<dyn Resolver>,
    transport: Box<dyn Transport>,
    timers: Box<dyn TimerService>,

    hooks: Hooks,
    on_resolved: Option<ResolvedCallback>,

    request: RequestTemplate,
    extractor: FieldExtractor,
    results: ExtractionResults,

    state: LifecycleState,
    resolved: Option<Ipv4Addr>,
    active: Option<ConnectionId>,

    acquiring: bool,
    watchdog_armed: bool,
    watchdog_generation: u32,
    reply_timer_armed: bool,

    dns_retry_count: u16,
    acquisition_count: u32,
}

impl AcquisitionController {
    /// Create a new controller in the `Idle` state
    ///
    /// # Parameters
    ///
    /// - `config`: Endpoint and policy configuration
    /// - `resolver`: DNS collaborator
    /// - `transport`: TCP collaborator
    /// - `timers`: Timer collaborator
    pub fn new(
        config: AcquisitionConfig,
        resolver: Box<dyn Resolver>,
        transport: Box<dyn Transport>,
        timers: Box<dyn TimerService>,
    ) -> Result<Self> {
        config.validate()?;

        let request = RequestTemplate::get(&config.endpoint.path, config.endpoint.host());
        let extractor = FieldExtractor::default();
        let results = extractor.results();

        Ok(Self {
            config,
            resolver,
            transport,
            timers,
            hooks: Hooks::default(),
            on_resolved: None,
            request,
            extractor,
            results,
            state: LifecycleState::Idle,
            resolved: None,
            active: None,
            acquiring: false,
            watchdog_armed: false,
            watchdog_generation: 0,
            reply_timer_armed: false,
            dns_retry_count: 0,
            acquisition_count: 0,
        })
    }

    /// Replace the endpoint and reset counters and state to `Idle`
    ///
    /// Refused while acquisition is running or a connection is open.
    pub fn initialize(&mut self, endpoint: EndpointConfig) -> Result<()> {
        if self.acquiring || self.active.is_some() {
            return Err(Error::AlreadyRunning);
        }
        endpoint.validate()?;

        self.disarm_watchdog();
        self.request = RequestTemplate::get(&endpoint.path, endpoint.host());
        self.config.endpoint = endpoint;
        self.resolved = None;
        self.dns_retry_count = 0;
        self.acquisition_count = 0;
        self.state = LifecycleState::Idle;
        Ok(())
    }

    /// Use a caller-prepared request template
    ///
    /// Rejected if the template cannot fit the request buffer even for the
    /// longest possible address.
    pub fn set_request_template(&mut self, template: RequestTemplate) -> Result<()> {
        template.render(Ipv4Addr::BROADCAST, self.config.request_buffer_size)?;
        self.request = template;
        Ok(())
    }

    /// Install the extraction rules and reply terminator
    pub fn set_extractor(&mut self, extractor: FieldExtractor) {
        self.results = extractor.results();
        self.extractor = extractor;
    }

    /// Install caller hooks
    pub fn set_hooks(&mut self, hooks: Hooks) {
        self.hooks = hooks;
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Acquisition interval (ms)
    pub fn interval(&self) -> u64 {
        self.config.endpoint.interval_ms
    }

    /// Host name, or the literal address when no host name is configured
    pub fn host(&self) -> &str {
        self.config.endpoint.host()
    }

    /// Request path
    pub fn path(&self) -> &str {
        &self.config.endpoint.path
    }

    /// Remote port
    pub fn port(&self) -> u16 {
        self.config.endpoint.port
    }

    /// Cached address, once resolved or supplied
    pub fn resolved_address(&self) -> Option<Ipv4Addr> {
        self.resolved
    }

    /// Failed attempts in the current resolution
    pub fn dns_retry_count(&self) -> u16 {
        self.dns_retry_count
    }

    /// Cycles started since acquisition was (re)started
    pub fn acquisition_count(&self) -> u32 {
        self.acquisition_count
    }

    /// Whether the acquisition timer is armed
    pub fn is_acquiring(&self) -> bool {
        self.acquiring
    }

    /// Results of the current cycle
    pub fn results(&self) -> &ExtractionResults {
        &self.results
    }

    /// Resolve the configured host name
    ///
    /// Without a host name the literal address is used and `on_resolved`
    /// is called before this returns. Otherwise the answer is delivered
    /// through the event queue; `on_resolved(None)` signals that every
    /// attempt failed.
    ///
    /// Refused with [`Error::AlreadyRunning`] while acquisition is running
    /// or a connection is open.
    pub fn resolve_host_name(
        &mut self,
        on_resolved: impl FnMut(Option<Ipv4Addr>) + Send + 'static,
    ) -> Result<()> {
        if self.acquiring || self.active.is_some() {
            return Err(Error::AlreadyRunning);
        }

        self.on_resolved = Some(Box::new(on_resolved));
        self.dns_retry_count = 0;

        match self.config.endpoint.hostname.clone() {
            Some(hostname) => {
                self.state = LifecycleState::ResolvingDns;
                self.issue_resolve(&hostname);
            }
            None => {
                let address = self
                    .config
                    .endpoint
                    .literal_address()?
                    .ok_or_else(|| Error::config("No host name or literal address configured"))?;
                self.resolved_to(address);
            }
        }

        Ok(())
    }

    /// Make a literal address available, e.g. after DNS failed
    pub fn use_literal_address(&mut self, address: Ipv4Addr) {
        self.disarm_watchdog();
        self.resolved = Some(address);
        if self.active.is_none() {
            self.state = LifecycleState::DnsResolved;
        }
        info!("Using literal address {}", address);
    }

    /// Arm the acquisition timer and connect immediately
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotResolved)`: No address has been resolved yet
    /// - `Err(Error::AlreadyRunning)`: Acquisition already started
    pub fn start_data_acquisition(&mut self) -> Result<()> {
        if self.resolved.is_none() {
            return Err(Error::NotResolved);
        }
        if self.acquiring {
            return Err(Error::AlreadyRunning);
        }

        info!("Data acquisition cycle start");
        self.acquisition_count = 0;

        let interval = self.config.endpoint.interval();
        self.timers.arm(TimerId::Acquisition, interval, true);
        self.acquiring = true;
        info!(
            "Starting acquisition timer with interval = {}ms",
            self.config.endpoint.interval_ms
        );

        self.begin_cycle();
        Ok(())
    }

    /// Disarm the acquisition timer
    ///
    /// A cycle already in flight finishes on its own.
    pub fn stop_data_acquisition(&mut self) {
        info!("Data acquisition stopped at cycle {}", self.acquisition_count);
        self.timers.disarm(TimerId::Acquisition);
        self.acquiring = false;
        self.acquisition_count = 0;
    }

    /// Process one collaborator event
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::DnsAnswer(answer) => self.on_dns_answer(answer),
            Event::TimerFired(TimerId::DnsWatchdog(generation)) => self.on_dns_watchdog(generation),
            Event::TimerFired(TimerId::Acquisition) => self.on_acquisition_tick(),
            Event::TimerFired(TimerId::ReplyTimeout) => self.on_reply_timeout(),
            Event::Connected(connection) => self.on_connected(connection),
            Event::ConnectFailed { connection, error } => self.on_connect_failed(connection, &error),
            Event::Sent(connection) => self.on_sent(connection),
            Event::SendFailed { connection, error } => {
                if self.active == Some(connection) {
                    self.send_failed(connection, &error);
                }
            }
            Event::Received { connection, data } => self.on_received(connection, &data),
            Event::Disconnected(connection) => self.on_disconnected(connection),
        }
    }

    /// Run the event loop until ctrl-c
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    pub async fn run(&mut self, events: EventReceiver) -> Result<()> {
        self.run_internal(events, None).await
    }

    /// Run the event loop until `shutdown_rx` fires (or ctrl-c when `None`)
    pub async fn run_with_shutdown(
        &mut self,
        events: EventReceiver,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(events, shutdown_rx).await
    }

    async fn run_internal(
        &mut self,
        events: EventReceiver,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let mut events = UnboundedReceiverStream::new(events);

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    Some(event) = events.next() => self.handle_event(event),

                    _ = &mut rx => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    Some(event) = events.next() => self.handle_event(event),

                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        self.shutdown();
        info!("Controller stopped");

        Ok(())
    }

    /// Stop acquisition, disarm every timer and close the open connection
    pub fn shutdown(&mut self) {
        if self.acquiring {
            self.stop_data_acquisition();
        }
        self.disarm_watchdog();
        self.disarm_reply_timer();
        if let Some(connection) = self.active {
            self.disconnect(connection);
        }
    }

    fn issue_resolve(&mut self, hostname: &str) {
        debug!("Resolving {} (attempt {})", hostname, self.dns_retry_count + 1);

        // a fire of the previous attempt may already be queued
        self.disarm_watchdog();
        self.watchdog_generation = self.watchdog_generation.wrapping_add(1);
        self.timers.arm(
            TimerId::DnsWatchdog(self.watchdog_generation),
            self.config.dns.watchdog(),
            false,
        );
        self.watchdog_armed = true;

        if let Err(e) = self.resolver.resolve(hostname) {
            warn!("Could not issue lookup for {}: {}", hostname, e);
        }
    }

    fn on_dns_answer(&mut self, answer: Option<Ipv4Addr>) {
        if self.state != LifecycleState::ResolvingDns {
            debug!("Ignoring DNS answer outside resolution: {:?}", answer);
            return;
        }

        self.disarm_watchdog();

        match answer {
            Some(address) => {
                info!("Resolved {} -> {}", self.host(), address);
                self.resolved_to(address);
            }
            None => {
                warn!("Could not resolve {}", self.host());
                self.dns_attempt_failed();
            }
        }
    }

    fn on_dns_watchdog(&mut self, generation: u32) {
        if !self.watchdog_armed || generation != self.watchdog_generation {
            debug!("Ignoring stale DNS watchdog #{}", generation);
            return;
        }
        self.watchdog_armed = false;

        if self.state != LifecycleState::ResolvingDns {
            return;
        }

        warn!("DNS resolve timer expired");
        self.dns_attempt_failed();
    }

    fn dns_attempt_failed(&mut self) {
        self.dns_retry_count += 1;

        let hostname = self.config.endpoint.hostname.clone().unwrap_or_default();

        if self.dns_retry_count >= self.config.dns.max_tries {
            self.disarm_watchdog();

            let err = Error::DnsResolutionFailed {
                hostname,
                attempts: self.dns_retry_count,
            };
            error!("{}", err);

            self.state = LifecycleState::Error;
            if let Some(on_resolved) = self.on_resolved.as_mut() {
                on_resolved(None);
            }

            self.fall_back_to_literal();
            return;
        }

        warn!(
            "Retrying DNS for {} ({}/{})",
            hostname, self.dns_retry_count, self.config.dns.max_tries
        );
        self.issue_resolve(&hostname);
    }

    fn fall_back_to_literal(&mut self) {
        if self.resolved.is_some() {
            return;
        }

        if let Ok(Some(address)) = self.config.endpoint.literal_address() {
            warn!("Falling back to literal address {}", address);
            self.resolved = Some(address);
            self.auto_start();
        }
    }

    fn resolved_to(&mut self, address: Ipv4Addr) {
        self.resolved = Some(address);
        self.state = LifecycleState::DnsResolved;

        if let Some(on_resolved) = self.on_resolved.as_mut() {
            on_resolved(Some(address));
        }

        self.auto_start();
    }

    fn auto_start(&mut self) {
        if self.config.auto_start && !self.acquiring {
            if let Err(e) = self.start_data_acquisition() {
                error!("Failed to start data acquisition: {}", e);
            }
        }
    }

    fn on_acquisition_tick(&mut self) {
        if !self.acquiring {
            debug!("Ignoring acquisition tick after stop");
            return;
        }
        self.begin_cycle();
    }

    fn begin_cycle(&mut self) {
        if let Some(connection) = self.active {
            warn!(
                "Previous cycle still open on {}, skipping cycle {}",
                connection, self.acquisition_count
            );
            return;
        }

        let Some(address) = self.resolved else {
            return;
        };

        info!("Starting data acquisition cycle = {}", self.acquisition_count);
        self.acquisition_count = self.acquisition_count.wrapping_add(1);

        self.results.reset();
        self.state = LifecycleState::Connecting;

        let remote = SocketAddrV4::new(address, self.config.endpoint.port);
        let connection = self.transport.connect(remote);
        debug!("Connecting to {} on {}", remote, connection);
        self.active = Some(connection);
    }

    fn on_connected(&mut self, connection: ConnectionId) {
        if self.active != Some(connection) {
            debug!("Ignoring connect of stale {}", connection);
            return;
        }
        info!("TCP connected");

        let Some(address) = self.resolved else {
            return;
        };

        let sent = self
            .request
            .render(address, self.config.request_buffer_size)
            .and_then(|buf| self.transport.send(connection, &buf));

        match sent {
            Ok(()) => self.state = LifecycleState::RequestSent,
            Err(e) => self.send_failed(connection, &e.to_string()),
        }

        if let Some(hook) = self.hooks.on_connect.as_mut() {
            hook(connection);
        }
    }

    fn on_connect_failed(&mut self, connection: ConnectionId, error: &str) {
        if self.active != Some(connection) {
            return;
        }
        warn!("{}", Error::ConnectFailed(error.to_string()));

        self.active = None;
        self.state = LifecycleState::Error;

        if let Some(hook) = self.hooks.on_connect_failed.as_mut() {
            hook(connection, error);
        }
    }

    fn send_failed(&mut self, connection: ConnectionId, error: &str) {
        warn!("{}", Error::SendFailed(error.to_string()));

        self.state = LifecycleState::Error;
        self.disarm_reply_timer();

        if let Some(hook) = self.hooks.on_send_failed.as_mut() {
            hook(connection, error);
        }

        self.disconnect(connection);
    }

    fn on_sent(&mut self, connection: ConnectionId) {
        if self.active != Some(connection) || self.state != LifecycleState::RequestSent {
            return;
        }
        debug!("TCP data sent");

        self.timers
            .arm(TimerId::ReplyTimeout, self.config.reply_timeout(), false);
        self.reply_timer_armed = true;
        self.state = LifecycleState::AwaitingReply;
        debug!("Started {}ms reply timeout timer", self.config.reply_timeout_ms);

        if let Some(hook) = self.hooks.on_send.as_mut() {
            hook(connection);
        }
    }

    fn on_received(&mut self, connection: ConnectionId, data: &[u8]) {
        if self.active != Some(connection) {
            debug!("Ignoring {} bytes for stale {}", data.len(), connection);
            return;
        }
        debug!("TCP data received ({} bytes)", data.len());

        let open = self.state.is_awaiting_reply();
        if open {
            self.extractor.extract(data, &mut self.results);
        }

        if let Some(hook) = self.hooks.on_receive.as_mut() {
            hook(connection, data);
        }

        if open && self.extractor.is_terminated(data) {
            self.disconnect(connection);
            self.disarm_reply_timer();
            self.state = LifecycleState::ReplyReceived;

            self.results.mark_acquired(chrono::Utc::now());
            info!(
                "Reply complete: {}/{} field(s) found",
                self.results.found_count(),
                self.results.len()
            );

            if let Some(hook) = self.hooks.on_data_ready.as_mut() {
                hook(ReplyOutcome::Complete(&self.results));
            }
        }
    }

    fn on_reply_timeout(&mut self) {
        if !self.reply_timer_armed {
            return;
        }
        self.reply_timer_armed = false;

        if self.state != LifecycleState::AwaitingReply {
            return;
        }

        warn!("{}", Error::ReplyTimeout);
        self.state = LifecycleState::Error;

        if let Some(connection) = self.active {
            self.disconnect(connection);
        }

        if let Some(hook) = self.hooks.on_data_ready.as_mut() {
            hook(ReplyOutcome::TimedOut);
        }
    }

    fn on_disconnected(&mut self, connection: ConnectionId) {
        if self.active != Some(connection) {
            debug!("Ignoring disconnect of stale {}", connection);
            return;
        }
        info!("TCP disconnected");
        self.active = None;

        if self.state.is_awaiting_reply() {
            warn!("Connection closed before reply terminator");
            self.disarm_reply_timer();
            self.state = LifecycleState::Error;

            if let Some(hook) = self.hooks.on_data_ready.as_mut() {
                hook(ReplyOutcome::Closed);
            }
        }

        if let Some(hook) = self.hooks.on_disconnect.as_mut() {
            hook(connection);
        }
    }

    fn disconnect(&mut self, connection: ConnectionId) {
        if let Err(e) = self.transport.disconnect(connection) {
            // no Disconnected event will follow
            debug!("Disconnect of {} failed: {}", connection, e);
            if self.active == Some(connection) {
                self.active = None;
            }
        }
    }

    fn disarm_watchdog(&mut self) {
        if self.watchdog_armed {
            self.timers
                .disarm(TimerId::DnsWatchdog(self.watchdog_generation));
            self.watchdog_armed = false;
        }
    }

    fn disarm_reply_timer(&mut self) {
        if self.reply_timer_armed {
            self.timers.disarm(TimerId::ReplyTimeout);
            self.reply_timer_armed = false;
        }
    }
}

impl std::fmt::Debug for AcquisitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionController")
            .field("endpoint", &self.config.endpoint)
            .field("state", &self.state)
            .field("resolved", &self.resolved)
            .field("active", &self.active)
            .field("acquiring", &self.acquiring)
            .field("dns_retry_count", &self.dns_retry_count)
            .field("acquisition_count", &self.acquisition_count)
            .finish()
    }
}
