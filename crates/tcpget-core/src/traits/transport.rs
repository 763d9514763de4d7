// # Transport Trait
//
// Defines the interface to the TCP stack.
//
// ## Event Contract
//
// For a connection returned by `connect()` the implementation posts, in order:
//
// 1. `Connected` or `ConnectFailed`
// 2. `Sent` or `SendFailed` after each `send()`
// 3. zero or more `Received` chunks
// 4. exactly one `Disconnected`, whether the peer closed, an I/O error
//    occurred or `disconnect()` was called
//
// A `ConnectFailed` connection never posts `Disconnected`.

use std::net::SocketAddrV4;

use crate::event::ConnectionId;

/// Non-blocking TCP transport
pub trait Transport: Send {
    /// Open a connection to `remote`
    ///
    /// Never fails synchronously: the outcome is always posted as
    /// `Connected` or `ConnectFailed` for the returned id.
    fn connect(&mut self, remote: SocketAddrV4) -> ConnectionId;

    /// Queue `data` for sending on `connection`
    fn send(&mut self, connection: ConnectionId, data: &[u8]) -> Result<(), crate::Error>;

    /// Close `connection`
    ///
    /// An `Err` means the connection is already gone and no further
    /// `Disconnected` event will be posted for it.
    fn disconnect(&mut self, connection: ConnectionId) -> Result<(), crate::Error>;
}
