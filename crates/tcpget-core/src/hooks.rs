//! Caller hooks
//!
//! Optional handlers the controller invokes at fixed points of a cycle.
//! An absent hook is simply skipped.

use std::fmt;

use crate::event::ConnectionId;
use crate::extract::ExtractionResults;

/// How a cycle's reply ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome<'a> {
    /// Terminator seen; results hold whatever fields were found
    Complete(&'a ExtractionResults),
    /// No terminator before the reply timer expired
    TimedOut,
    /// Peer closed the connection before the terminator
    Closed,
}

impl<'a> ReplyOutcome<'a> {
    /// Results of a complete reply, `None` on failure
    pub fn results(&self) -> Option<&'a ExtractionResults> {
        match self {
            ReplyOutcome::Complete(results) => Some(results),
            _ => None,
        }
    }

    /// Whether the reply was terminated normally
    pub fn is_complete(&self) -> bool {
        matches!(self, ReplyOutcome::Complete(_))
    }
}

type ConnectionHook = Box<dyn FnMut(ConnectionId) + Send>;
type FailureHook = Box<dyn FnMut(ConnectionId, &str) + Send>;
type ReceiveHook = Box<dyn FnMut(ConnectionId, &[u8]) + Send>;
type DataReadyHook = Box<dyn FnMut(ReplyOutcome<'_>) + Send>;

/// Table of optional event handlers
#[derive(Default)]
pub struct Hooks {
    pub(crate) on_connect: Option<ConnectionHook>,
    pub(crate) on_connect_failed: Option<FailureHook>,
    pub(crate) on_disconnect: Option<ConnectionHook>,
    pub(crate) on_send: Option<ConnectionHook>,
    pub(crate) on_send_failed: Option<FailureHook>,
    pub(crate) on_receive: Option<ReceiveHook>,
    pub(crate) on_data_ready: Option<DataReadyHook>,
}

impl Hooks {
    /// Empty hook table
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once a new connection is up and the request has been handed
    /// to the transport
    ///
    /// Also called when that hand-off fails, after the send-failed hook.
    pub fn with_connect(mut self, hook: impl FnMut(ConnectionId) + Send + 'static) -> Self {
        self.on_connect = Some(Box::new(hook));
        self
    }

    /// Called when a connect attempt fails
    pub fn with_connect_failed(mut self, hook: impl FnMut(ConnectionId, &str) + Send + 'static) -> Self {
        self.on_connect_failed = Some(Box::new(hook));
        self
    }

    /// Called when a connection closes
    pub fn with_disconnect(mut self, hook: impl FnMut(ConnectionId) + Send + 'static) -> Self {
        self.on_disconnect = Some(Box::new(hook));
        self
    }

    /// Called once the request has been sent
    pub fn with_send(mut self, hook: impl FnMut(ConnectionId) + Send + 'static) -> Self {
        self.on_send = Some(Box::new(hook));
        self
    }

    /// Called when sending the request fails
    pub fn with_send_failed(mut self, hook: impl FnMut(ConnectionId, &str) + Send + 'static) -> Self {
        self.on_send_failed = Some(Box::new(hook));
        self
    }

    /// Called with every raw reply chunk
    pub fn with_receive(mut self, hook: impl FnMut(ConnectionId, &[u8]) + Send + 'static) -> Self {
        self.on_receive = Some(Box::new(hook));
        self
    }

    /// Called exactly once per cycle that reached the reply stage
    pub fn with_data_ready(mut self, hook: impl FnMut(ReplyOutcome<'_>) + Send + 'static) -> Self {
        self.on_data_ready = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_connect_failed", &self.on_connect_failed.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_send", &self.on_send.is_some())
            .field("on_send_failed", &self.on_send_failed.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_data_ready", &self.on_data_ready.is_some())
            .finish()
    }
}
