//! Timers over `tokio::time`
//!
//! Each armed timer is a task that posts [`Event::TimerFired`]. Disarming
//! aborts the task; a fire already queued is left for the controller to
//! discard.

use std::collections::HashMap;
use std::time::Duration;

use tcpget_core::{Event, EventSender, TimerId, TimerService};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Tokio timer service
pub struct TokioTimers {
    events: EventSender,
    armed: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioTimers {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            armed: HashMap::new(),
        }
    }

    /// Whether `timer` has a live task
    pub fn is_armed(&self, timer: TimerId) -> bool {
        self.armed.get(&timer).is_some_and(|handle| !handle.is_finished())
    }
}

impl TimerService for TokioTimers {
    fn arm(&mut self, timer: TimerId, period: Duration, repeating: bool) {
        self.disarm(timer);
        // watchdogs are keyed per attempt
        self.armed.retain(|_, handle| !handle.is_finished());

        let events = self.events.clone();
        let handle = if repeating {
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if events.send(Event::TimerFired(timer)).is_err() {
                        break;
                    }
                }
            })
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(period).await;
                let _ = events.send(Event::TimerFired(timer));
            })
        };

        tracing::debug!("Armed {:?} for {:?} (repeating: {})", timer, period, repeating);
        self.armed.insert(timer, handle);
    }

    fn disarm(&mut self, timer: TimerId) {
        if let Some(handle) = self.armed.remove(&timer) {
            handle.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, handle) in self.armed.drain() {
            handle.abort();
        }
    }
}
