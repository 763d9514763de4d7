//! Events delivered to the acquisition controller
//!
//! Every collaborator completion (resolver answer, timer expiry, transport
//! notification) is posted as an [`Event`] on one queue. The controller
//! drains that queue one event at a time, so no two callbacks ever run
//! concurrently.

use std::fmt;
use std::net::Ipv4Addr;
use tokio::sync::mpsc;

/// Sending half of the controller's event queue
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Receiving half of the controller's event queue
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Create an event queue
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Identifies one TCP connection issued by a [`Transport`](crate::traits::Transport)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// The controller's timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Bounds one DNS resolution attempt; numbered per attempt so a fire
    /// left over from an earlier attempt can be told apart
    DnsWatchdog(u32),
    /// Repeating acquisition tick
    Acquisition,
    /// Bounds the wait for the reply terminator
    ReplyTimeout,
}

/// A collaborator completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Resolver answered; `None` means resolution failed
    DnsAnswer(Option<Ipv4Addr>),

    /// A timer expired
    TimerFired(TimerId),

    /// Connection established
    Connected(ConnectionId),

    /// Connection could not be established
    ConnectFailed {
        connection: ConnectionId,
        error: String,
    },

    /// Request bytes handed to the network
    Sent(ConnectionId),

    /// Request could not be sent
    SendFailed {
        connection: ConnectionId,
        error: String,
    },

    /// Reply bytes arrived
    Received {
        connection: ConnectionId,
        data: Vec<u8>,
    },

    /// Connection closed (by either side)
    Disconnected(ConnectionId),
}
