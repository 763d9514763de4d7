use std::fmt;

/// Lifecycle state of an [`AcquisitionController`](super::AcquisitionController)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Initialized, nothing issued yet
    #[default]
    Idle,
    /// Host name lookup in flight
    ResolvingDns,
    /// An address is available
    DnsResolved,
    /// TCP connect issued
    Connecting,
    /// Connected and request handed to the transport
    RequestSent,
    /// Request sent, reply timer running
    AwaitingReply,
    /// Terminator seen, cycle complete
    ReplyReceived,
    /// DNS exhausted, or the last cycle failed
    Error,
}

impl LifecycleState {
    /// Whether a request is out and its reply not yet settled
    pub fn is_awaiting_reply(&self) -> bool {
        matches!(self, LifecycleState::RequestSent | LifecycleState::AwaitingReply)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::ResolvingDns => "resolving-dns",
            LifecycleState::DnsResolved => "dns-resolved",
            LifecycleState::Connecting => "connecting",
            LifecycleState::RequestSent => "request-sent",
            LifecycleState::AwaitingReply => "awaiting-reply",
            LifecycleState::ReplyReceived => "reply-received",
            LifecycleState::Error => "error",
        };
        f.write_str(name)
    }
}
