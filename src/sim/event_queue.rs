//! Event keys with deterministic ordering.

use std::cmp::Ordering;
use std::time::Duration;

/// Key for ordering events in the queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Sequence number (insertion order for the same time)
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct EventKey {
    /// When this event fires.
    pub time: Duration,
    /// Sequence number for FIFO ordering at equal times.
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: Duration, sequence: u64) -> Self {
        Self { time, sequence }
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Handle to a scheduled event, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub(crate) EventKey);

impl EventId {
    pub fn time(&self) -> Duration {
        self.0.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_key_ordering() {
        let earlier = EventKey::new(Duration::from_secs(1), 5);
        let later = EventKey::new(Duration::from_secs(2), 1);
        assert!(earlier < later);
    }

    #[test]
    fn test_sequence_breaks_ties() {
        let first = EventKey::new(Duration::from_millis(1500), 1);
        let second = EventKey::new(Duration::from_millis(1500), 2);
        assert!(first < second);
    }
}
