//! Packet sinks.
//!
//! A sink is bound to one `(address, port)` and owns its counters. Only
//! [`PacketSink::receive`] increments them; only the throughput sampler
//! takes (and thereby resets) the per-tick part.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::topology::NodeId;

/// Counts accumulated since the last sampling tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickCounters {
    pub bytes: u64,
    pub packets: u64,
}

/// Receiving endpoint of one flow
#[derive(Debug, Clone, Serialize)]
pub struct PacketSink {
    pub node: NodeId,
    pub address: Ipv4Addr,
    pub port: u16,
    since_tick: TickCounters,
    total_bytes: u64,
    total_packets: u64,
}

impl PacketSink {
    pub fn new(node: NodeId, address: Ipv4Addr, port: u16) -> Self {
        Self {
            node,
            address,
            port,
            since_tick: TickCounters::default(),
            total_bytes: 0,
            total_packets: 0,
        }
    }

    /// Receive handler: account one packet of `bytes`
    pub fn receive(&mut self, bytes: u32) {
        self.since_tick.bytes += u64::from(bytes);
        self.since_tick.packets += 1;
        self.total_bytes += u64::from(bytes);
        self.total_packets += 1;
    }

    /// Counters since the last tick, without resetting them
    pub fn tick_counters(&self) -> TickCounters {
        self.since_tick
    }

    /// Return the counters since the last tick and reset them to zero
    pub fn take_tick_counters(&mut self) -> TickCounters {
        std::mem::take(&mut self.since_tick)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn total_packets(&self) -> u64 {
        self.total_packets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_resets_tick_but_not_totals() {
        let mut sink = PacketSink::new(NodeId(0), Ipv4Addr::new(10, 1, 7, 1), 9);
        sink.receive(64);
        sink.receive(64);
        assert_eq!(sink.take_tick_counters(), TickCounters { bytes: 128, packets: 2 });
        assert_eq!(sink.tick_counters(), TickCounters::default());

        sink.receive(100);
        assert_eq!(sink.take_tick_counters(), TickCounters { bytes: 100, packets: 1 });
        assert_eq!(sink.total_bytes(), 228);
        assert_eq!(sink.total_packets(), 3);
    }
}
