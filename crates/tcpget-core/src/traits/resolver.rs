// # Resolver Trait
//
// Defines the interface for asynchronous host name resolution.
//
// ## Implementations
//
// - Tokio-based (system or explicit DNS servers): `tcpget-net` crate
// - Test doubles: `tests/common`
//
// ## Contract
//
// `resolve()` returns as soon as the lookup is issued. The answer is posted
// later as `Event::DnsAnswer(Some(addr))` or `Event::DnsAnswer(None)`.
// Issuing a new lookup abandons any lookup still in flight.

/// Asynchronous IPv4 host name resolver
///
/// The controller owns the retry policy: implementations make exactly one
/// attempt per call and never retry on their own.
pub trait Resolver: Send {
    /// Start resolving `hostname`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Lookup issued; an answer event will follow
    /// - `Err(Error)`: Lookup could not be issued (the DNS watchdog still
    ///   bounds the attempt)
    fn resolve(&mut self, hostname: &str) -> Result<(), crate::Error>;
}
