// # tcpget-core
//
// Core library for a periodic, single-connection TCP GET client.
//
// ## Architecture Overview
//
// - **Resolver / Transport / TimerService**: Traits for the host DNS, TCP and
//   timer services
// - **AcquisitionController**: Drives the DNS → connect → send → receive →
//   disconnect cycle on a fixed interval
// - **FieldExtractor**: Pulls caller-defined fields out of each reply chunk
// - **Hooks**: Optional caller handlers invoked at each step of a cycle
//
// ## Design Principles
//
// 1. **Single-threaded**: Every completion is an `Event` processed to completion
//    before the next one
// 2. **Owned state**: One controller value holds everything; no globals
// 3. **Bounded buffers**: Request and field sizes are capped explicitly
// 4. **Library-First**: The daemon is a thin wrapper around this crate

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod extract;
pub mod hooks;
pub mod request;
pub mod traits;

// Re-export core types for convenience
pub use config::{AcquisitionConfig, DnsConfig, EndpointConfig};
pub use controller::{AcquisitionController, LifecycleState};
pub use error::{Error, Result};
pub use event::{ConnectionId, Event, EventReceiver, EventSender, TimerId};
pub use extract::{ExtractionResults, ExtractionRule, FieldExtractor};
pub use hooks::{Hooks, ReplyOutcome};
pub use request::RequestTemplate;
pub use traits::{Resolver, TimerService, Transport};
