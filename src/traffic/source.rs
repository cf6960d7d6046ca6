//! Constant-bit-rate on/off sources.
//!
//! The on period is the constant 1 and the off period the constant 0, so an
//! active source never pauses: it sends one fixed-size packet every
//! `packet_size * 8 / data_rate` seconds from its start time until stopped.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::Serialize;

use crate::topology::NodeId;

/// Lifecycle of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    /// Waiting for its start time
    Idle,
    Running,
    Stopped,
}

/// On/off source with on-probability 1
#[derive(Debug, Clone, Serialize)]
pub struct OnOffSource {
    pub node: NodeId,
    pub local_address: Ipv4Addr,
    pub local_port: u16,
    pub remote_address: Ipv4Addr,
    pub remote_port: u16,
    pub packet_size: u32,
    pub data_rate_bps: u64,
    pub start: Duration,
    pub stop: Duration,
    state: SourceState,
    packets_sent: u64,
}

impl OnOffSource {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node: NodeId,
        local_address: Ipv4Addr,
        local_port: u16,
        remote_address: Ipv4Addr,
        remote_port: u16,
        packet_size: u32,
        data_rate_bps: u64,
        start: Duration,
        stop: Duration,
    ) -> Self {
        Self {
            node,
            local_address,
            local_port,
            remote_address,
            remote_port,
            packet_size,
            data_rate_bps,
            start,
            stop,
            state: SourceState::Idle,
            packets_sent: 0,
        }
    }

    /// Time between consecutive packets
    pub fn interval(&self) -> Duration {
        let bits = u128::from(self.packet_size) * 8;
        let nanos = bits * 1_000_000_000 / u128::from(self.data_rate_bps.max(1));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Enter the on state at `now`.
    ///
    /// # Returns
    /// The time of the first transmission, one interval after `now`.
    pub fn start(&mut self, now: Duration) -> Option<Duration> {
        if self.state != SourceState::Idle || now >= self.stop {
            return None;
        }
        self.state = SourceState::Running;
        Some(now + self.interval())
    }

    /// Account one transmission at `now` and return the next send time.
    /// `None` means the source is no longer running and nothing was sent.
    pub fn on_send(&mut self, now: Duration) -> Option<Duration> {
        if self.state != SourceState::Running || now >= self.stop {
            return None;
        }
        self.packets_sent += 1;
        Some(now + self.interval())
    }

    pub fn stop(&mut self) {
        self.state = SourceState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(start: u64, stop: u64) -> OnOffSource {
        OnOffSource::new(
            NodeId(35),
            Ipv4Addr::new(10, 1, 6, 6),
            49153,
            Ipv4Addr::new(10, 1, 7, 1),
            9,
            64,
            2048,
            Duration::from_secs(start),
            Duration::from_secs(stop),
        )
    }

    #[test]
    fn test_default_interval() {
        // 64 bytes at 2048 bps
        assert_eq!(source(100, 200).interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_sends_until_stop_time() {
        let mut src = source(100, 101);
        let mut next = src.start(Duration::from_secs(100));
        let mut sends = 0;
        while let Some(t) = next {
            next = src.on_send(t);
            if next.is_some() {
                sends += 1;
            }
        }
        // Sends at 100.25, 100.5, 100.75; the one at 101 is past stop
        assert_eq!(sends, 3);
        assert_eq!(src.packets_sent(), 3);
    }

    #[test]
    fn test_stopped_source_sends_nothing() {
        let mut src = source(100, 200);
        let first = src.start(Duration::from_secs(100)).unwrap();
        src.stop();
        assert_eq!(src.on_send(first), None);
        assert_eq!(src.state(), SourceState::Stopped);
        assert_eq!(src.start(Duration::from_secs(150)), None);
    }

    #[test]
    fn test_start_after_stop_time_never_runs() {
        let mut src = source(250, 200);
        assert_eq!(src.start(Duration::from_secs(250)), None);
        assert_eq!(src.state(), SourceState::Idle);
    }
}
