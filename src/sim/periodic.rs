//! Cancellable periodic task handle.

use std::time::Duration;

use super::event_queue::EventId;
use super::scheduler::Scheduler;

/// A task that reschedules itself every `period`.
///
/// The handle remembers the pending occurrence so stopping the task removes
/// it from the queue instead of letting it fire after teardown.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    period: Duration,
    pending: Option<EventId>,
    fired: u64,
}

impl PeriodicTask {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            pending: None,
            fired: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Schedule the first occurrence at `first`
    pub fn start<E>(&mut self, scheduler: &mut Scheduler<E>, first: Duration, event: E) {
        self.cancel(scheduler);
        self.pending = Some(scheduler.schedule_at(first, event));
    }

    /// Record that the pending occurrence fired and schedule the next one
    /// at `now + period`.
    pub fn reschedule<E>(&mut self, scheduler: &mut Scheduler<E>, event: E) {
        self.fired += 1;
        self.pending = Some(scheduler.schedule_in(self.period, event));
    }

    /// Cancel the pending occurrence, if any
    pub fn cancel<E>(&mut self, scheduler: &mut Scheduler<E>) -> bool {
        match self.pending.take() {
            Some(id) => scheduler.cancel(id).is_some(),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    /// Occurrences that have fired
    pub fn fired(&self) -> u64 {
        self.fired
    }
}
