// # Timer Service Trait
//
// Named one-shot and repeating timers. Expiry is posted as
// `Event::TimerFired(id)`.

use std::time::Duration;

use crate::event::TimerId;

/// Host timer service
pub trait TimerService: Send {
    /// Arm `timer`, replacing any earlier arming of the same timer
    ///
    /// A repeating timer first fires after one full `period`.
    fn arm(&mut self, timer: TimerId, period: Duration, repeating: bool);

    /// Disarm `timer`; a no-op when it is not armed
    fn disarm(&mut self, timer: TimerId);
}
