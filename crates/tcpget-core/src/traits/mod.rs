//! Collaborator traits for the TCP GET client
//!
//! The controller drives three external services through these interfaces.
//! Calls only *issue* work; completions come back later as
//! [`Event`](crate::event::Event)s on the controller's queue.
//!
//! - [`Resolver`]: Resolve a host name to an IPv4 address
//! - [`Transport`]: Connect, send and disconnect TCP connections
//! - [`TimerService`]: Arm and disarm named timers

pub mod resolver;
pub mod timer;
pub mod transport;

pub use resolver::Resolver;
pub use timer::TimerService;
pub use transport::Transport;
