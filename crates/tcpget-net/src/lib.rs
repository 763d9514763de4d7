// # Tokio network services
//
// Implementations of the tcpget-core collaborator traits on top of tokio.
//
// ## Architecture
//
// Each command spawns (or signals) a task that performs the I/O and posts the
// outcome to the controller's event queue. Nothing here calls back into the
// controller directly, so every completion is processed on the controller's
// own task in arrival order.
//
// ## Runtime
//
// All three services spawn tasks and must be used from within a tokio
// runtime. The daemon uses a current-thread runtime.

mod resolver;
mod timers;
mod transport;

pub use resolver::{NameService, ServerListNameService, SystemNameService, TokioResolver};
pub use timers::TokioTimers;
pub use transport::TokioTransport;
