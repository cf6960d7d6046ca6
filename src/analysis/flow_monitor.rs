//! Flow classification and per-flow counters.
//!
//! Packets are classified by five-tuple; a flow id is assigned the first
//! time a tuple is transmitted, starting at 1. The monitor tracks packets
//! in flight so that packets never received can be declared lost.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use log::debug;
use serde::Serialize;

use crate::traffic::FiveTuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FlowId(pub u32);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters and timestamps of one flow
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowStats {
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub lost_packets: u64,
    pub first_tx: Option<Duration>,
    pub last_tx: Option<Duration>,
    pub first_rx: Option<Duration>,
    pub last_rx: Option<Duration>,
    /// Sum of end-to-end delays of received packets
    pub delay_sum: Duration,
}

/// Read access to classified flows
pub trait FlowTable {
    /// Flow ids in ascending order
    fn flow_ids(&self) -> Vec<FlowId>;
    fn five_tuple(&self, id: FlowId) -> Option<FiveTuple>;
    fn stats(&self, id: FlowId) -> Option<&FlowStats>;
}

#[derive(Debug, Clone)]
struct FlowRecord {
    five_tuple: FiveTuple,
    stats: FlowStats,
}

/// Per-flow monitor
#[derive(Debug, Default)]
pub struct FlowMonitor {
    classifier: HashMap<FiveTuple, FlowId>,
    flows: BTreeMap<FlowId, FlowRecord>,
    /// (flow, sequence) -> transmit time
    in_flight: HashMap<(FlowId, u64), Duration>,
    next_sequence: u64,
}

impl FlowMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transmission. Returns the flow id and the packet sequence
    /// number that the matching receive must quote.
    pub fn on_transmit(&mut self, now: Duration, five_tuple: FiveTuple, bytes: u32) -> (FlowId, u64) {
        let next_id = FlowId(self.classifier.len() as u32 + 1);
        let id = *self.classifier.entry(five_tuple).or_insert(next_id);
        let record = self.flows.entry(id).or_insert_with(|| {
            debug!("New flow {}: {}", id, five_tuple);
            FlowRecord {
                five_tuple,
                stats: FlowStats::default(),
            }
        });

        let stats = &mut record.stats;
        stats.tx_packets += 1;
        stats.tx_bytes += u64::from(bytes);
        stats.first_tx.get_or_insert(now);
        stats.last_tx = Some(now);

        self.next_sequence += 1;
        self.in_flight.insert((id, self.next_sequence), now);
        (id, self.next_sequence)
    }

    /// Record a reception of a previously transmitted packet
    pub fn on_receive(&mut self, now: Duration, flow: FlowId, sequence: u64, bytes: u32) {
        let Some(sent) = self.in_flight.remove(&(flow, sequence)) else {
            return;
        };
        if let Some(record) = self.flows.get_mut(&flow) {
            let stats = &mut record.stats;
            stats.rx_packets += 1;
            stats.rx_bytes += u64::from(bytes);
            stats.first_rx.get_or_insert(now);
            stats.last_rx = Some(now);
            stats.delay_sum += now.saturating_sub(sent);
        }
    }

    /// Declare lost every in-flight packet sent more than `max_delay` before
    /// `now`. Returns the number of packets newly counted as lost.
    pub fn check_for_lost_packets(&mut self, now: Duration, max_delay: Duration) -> u64 {
        let expired: Vec<(FlowId, u64)> = self
            .in_flight
            .iter()
            .filter(|(_, sent)| now.saturating_sub(**sent) > max_delay)
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            self.in_flight.remove(key);
            if let Some(record) = self.flows.get_mut(&key.0) {
                record.stats.lost_packets += 1;
            }
        }
        expired.len() as u64
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }
}

impl FlowTable for FlowMonitor {
    fn flow_ids(&self) -> Vec<FlowId> {
        self.flows.keys().copied().collect()
    }

    fn five_tuple(&self, id: FlowId) -> Option<FiveTuple> {
        self.flows.get(&id).map(|r| r.five_tuple)
    }

    fn stats(&self, id: FlowId) -> Option<&FlowStats> {
        self.flows.get(&id).map(|r| &r.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::UDP_PROTOCOL;
    use std::net::Ipv4Addr;

    fn tuple(source_port: u16) -> FiveTuple {
        FiveTuple {
            source_address: Ipv4Addr::new(10, 1, 6, 6),
            destination_address: Ipv4Addr::new(10, 1, 7, 1),
            source_port,
            destination_port: 9,
            protocol: UDP_PROTOCOL,
        }
    }

    #[test]
    fn test_ids_assigned_on_first_transmit() {
        let mut monitor = FlowMonitor::new();
        let (a, _) = monitor.on_transmit(Duration::from_secs(100), tuple(49153), 64);
        let (b, _) = monitor.on_transmit(Duration::from_secs(100), tuple(49154), 64);
        let (a_again, _) = monitor.on_transmit(Duration::from_secs(101), tuple(49153), 64);
        assert_eq!(a, FlowId(1));
        assert_eq!(b, FlowId(2));
        assert_eq!(a_again, a);
        assert_eq!(monitor.flow_ids(), vec![FlowId(1), FlowId(2)]);
    }

    #[test]
    fn test_counters_and_timestamps() {
        let mut monitor = FlowMonitor::new();
        let (id, s1) = monitor.on_transmit(Duration::from_secs(100), tuple(49153), 64);
        let (_, s2) = monitor.on_transmit(Duration::from_secs(101), tuple(49153), 64);
        monitor.on_receive(Duration::from_millis(100_001), id, s1, 64);
        monitor.on_receive(Duration::from_millis(101_001), id, s2, 64);

        let stats = monitor.stats(id).unwrap();
        assert_eq!(stats.tx_packets, 2);
        assert_eq!(stats.rx_bytes, 128);
        assert_eq!(stats.first_tx, Some(Duration::from_secs(100)));
        assert_eq!(stats.last_rx, Some(Duration::from_millis(101_001)));
        assert_eq!(stats.delay_sum, Duration::from_millis(2));
        assert_eq!(monitor.in_flight(), 0);
    }

    #[test]
    fn test_lost_packets_after_max_delay() {
        let mut monitor = FlowMonitor::new();
        let (id, _) = monitor.on_transmit(Duration::from_secs(100), tuple(49153), 64);
        monitor.on_transmit(Duration::from_secs(195), tuple(49153), 64);

        let lost = monitor.check_for_lost_packets(Duration::from_secs(200), Duration::from_secs(10));
        assert_eq!(lost, 1);
        assert_eq!(monitor.stats(id).unwrap().lost_packets, 1);
        // The recent packet is still in flight
        assert_eq!(monitor.in_flight(), 1);
    }
}
