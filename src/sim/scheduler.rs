//! Discrete-event scheduler.
//!
//! A single ordered queue of events. Events run one at a time in
//! non-decreasing time order; equal times run in insertion order.

use std::collections::BTreeMap;
use std::time::Duration;

use log::trace;

use super::event_queue::{EventId, EventKey};

/// Ordered event queue with a simulated clock
#[derive(Debug)]
pub struct Scheduler<E> {
    queue: BTreeMap<EventKey, E>,
    sequence: u64,
    now: Duration,
    executed: u64,
    cancelled: u64,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            executed: 0,
            cancelled: 0,
        }
    }

    /// Current simulated time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `event` at an absolute time. Times in the past are clamped
    /// to now.
    pub fn schedule_at(&mut self, time: Duration, event: E) -> EventId {
        self.sequence += 1;
        let key = EventKey::new(time.max(self.now), self.sequence);
        self.queue.insert(key, event);
        EventId(key)
    }

    /// Schedule `event` after `delay`
    pub fn schedule_in(&mut self, delay: Duration, event: E) -> EventId {
        self.schedule_at(self.now + delay, event)
    }

    /// Cancel a pending event. Returns the event if it had not fired yet.
    pub fn cancel(&mut self, id: EventId) -> Option<E> {
        let event = self.queue.remove(&id.0);
        if event.is_some() {
            self.cancelled += 1;
        }
        event
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.queue.contains_key(&id.0)
    }

    /// Pop the next event if it fires strictly before `horizon`, advancing
    /// the clock to its time.
    pub fn pop_before(&mut self, horizon: Duration) -> Option<(Duration, E)> {
        let (&key, _) = self.queue.first_key_value()?;
        if key.time >= horizon {
            return None;
        }
        let (key, event) = self.queue.pop_first()?;
        self.now = key.time;
        self.executed += 1;
        trace!("t={:?} event #{}", key.time, key.sequence);
        Some((key.time, event))
    }

    /// Drop every pending event and move the clock to `time`.
    ///
    /// Returns the number of events discarded.
    pub fn drain(&mut self, time: Duration) -> usize {
        let discarded = self.queue.len();
        self.queue.clear();
        self.now = self.now.max(time);
        discarded
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}
