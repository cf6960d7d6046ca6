//! Sender/sink pairing and flow creation.
//!
//! For each pair a sink is bound at the sink node's highest-level address
//! and the experiment port, and a constant-bit-rate source on the sender
//! targets it. Start times are drawn from the jitter window on the build
//! stream, one draw per flow, in flow order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use log::{debug, info};
use serde::Serialize;

use crate::config::{ConfigError, FlowAssignment, StartWindow};
use crate::fabric::Fabric;
use crate::mobility::UniformStream;
use crate::topology::{Hierarchy, NodeId, NodeRole};

use super::sink::PacketSink;
use super::source::OnOffSource;

/// First ephemeral port handed to a node's sockets
pub const EPHEMERAL_PORT_START: u16 = 49153;

/// IP protocol number of UDP
pub const UDP_PROTOCOL: u8 = 17;

/// Flow classification key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FiveTuple {
    pub source_address: Ipv4Addr,
    pub destination_address: Ipv4Addr,
    pub source_port: u16,
    pub destination_port: u16,
    pub protocol: u8,
}

impl fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source_address, self.source_port, self.destination_address, self.destination_port
        )
    }
}

/// One sender -> sink flow
#[derive(Debug, Clone, Serialize)]
pub struct Flow {
    /// 1-based, in creation order
    pub id: u32,
    pub source: NodeId,
    pub destination: NodeId,
    pub port: u16,
    pub five_tuple: FiveTuple,
    pub start: Duration,
    pub stop: Duration,
}

/// Traffic parameters
#[derive(Debug, Clone)]
pub struct TrafficParams {
    pub sinks: usize,
    pub port: u16,
    pub packet_size: u32,
    pub data_rate_bps: u64,
    pub start_window: StartWindow,
    /// Explicit pairs; derived from the hierarchy when empty
    pub assignments: Vec<FlowAssignment>,
    /// Stop time of every source
    pub horizon: Duration,
}

/// Flows with their sinks and sources; `flows[i]`, `sinks[i]` and
/// `sources[i]` belong together.
#[derive(Debug, Clone)]
pub struct TrafficPlan {
    pub flows: Vec<Flow>,
    pub sinks: Vec<PacketSink>,
    pub sources: Vec<OnOffSource>,
}

impl TrafficPlan {
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

/// Default pairing: sinks are the top relay set's heads in order, senders
/// are leaf nodes from the highest id down, skipping sinks.
pub fn default_assignments(hierarchy: &Hierarchy, count: usize, port: u16) -> Result<Vec<FlowAssignment>, ConfigError> {
    let relay = hierarchy.top_relay_set();
    if relay.len() < count {
        return Err(ConfigError::invalid(
            "traffic.sinks",
            format!("{} sinks requested but the top relay set has {} heads", count, relay.len()),
        ));
    }
    let sinks: Vec<NodeId> = relay[..count].to_vec();
    let sink_set: HashSet<NodeId> = sinks.iter().copied().collect();
    let senders: Vec<NodeId> = hierarchy
        .leaf_nodes()
        .iter()
        .rev()
        .map(|n| n.id)
        .filter(|id| !sink_set.contains(id))
        .take(count)
        .collect();
    if senders.len() < count {
        return Err(ConfigError::invalid(
            "traffic.sinks",
            format!("{} sinks requested but only {} sender candidates remain", count, senders.len()),
        ));
    }

    Ok(sinks
        .into_iter()
        .zip(senders)
        .map(|(sink, sender)| FlowAssignment {
            sender: sender.0,
            sink: sink.0,
            port: Some(port),
        })
        .collect())
}

/// Create every flow of the experiment.
///
/// Tags sink nodes `Sink` and sender nodes `Source`, and draws one start
/// time per flow from `stream`.
pub fn generate_traffic(
    hierarchy: &mut Hierarchy,
    fabric: &Fabric,
    params: &TrafficParams,
    stream: &mut UniformStream,
) -> Result<TrafficPlan, ConfigError> {
    let assignments = if params.assignments.is_empty() {
        default_assignments(hierarchy, params.sinks, params.port)?
    } else {
        params.assignments.clone()
    };

    let mut flows = Vec::with_capacity(assignments.len());
    let mut sinks = Vec::with_capacity(assignments.len());
    let mut sources = Vec::with_capacity(assignments.len());
    let mut bound: HashSet<(Ipv4Addr, u16)> = HashSet::new();
    let mut next_port: HashMap<NodeId, u16> = HashMap::new();

    for (index, assignment) in assignments.iter().enumerate() {
        let sender = NodeId(assignment.sender);
        let sink_node = NodeId(assignment.sink);
        let port = assignment.port.unwrap_or(params.port);

        if hierarchy.node(sender).is_none() || hierarchy.node(sink_node).is_none() {
            return Err(ConfigError::invalid(
                "traffic.assignments",
                format!(
                    "pair {} -> {} references a node outside 0..{}",
                    sender,
                    sink_node,
                    hierarchy.nodes.len()
                ),
            ));
        }
        if sender == sink_node {
            return Err(ConfigError::invalid(
                "traffic.assignments",
                format!("node {} cannot send to itself", sender),
            ));
        }

        let sink_address = address_of(fabric, sink_node, true)?;
        let source_address = address_of(fabric, sender, false)?;
        if !bound.insert((sink_address, port)) {
            return Err(ConfigError::invalid(
                "traffic.assignments",
                format!("sink {}:{} is bound twice", sink_address, port),
            ));
        }

        let local_port = next_port.entry(sender).or_insert(EPHEMERAL_PORT_START);
        let source_port = *local_port;
        *local_port = local_port.wrapping_add(1).max(EPHEMERAL_PORT_START);

        let drawn = stream.draw(params.start_window.min, params.start_window.max);
        let start = Duration::try_from_secs_f64(drawn).map_err(|e| {
            ConfigError::invalid("traffic.start_window", format!("start time {}s: {}", drawn, e))
        })?;
        let five_tuple = FiveTuple {
            source_address,
            destination_address: sink_address,
            source_port,
            destination_port: port,
            protocol: UDP_PROTOCOL,
        };
        debug!("Flow {}: node {} ({}) starts at {:.3}s", index + 1, sender, five_tuple, start.as_secs_f64());

        flows.push(Flow {
            id: index as u32 + 1,
            source: sender,
            destination: sink_node,
            port,
            five_tuple,
            start,
            stop: params.horizon,
        });
        sinks.push(PacketSink::new(sink_node, sink_address, port));
        sources.push(OnOffSource::new(
            sender,
            source_address,
            source_port,
            sink_address,
            port,
            params.packet_size,
            params.data_rate_bps,
            start,
            params.horizon,
        ));
    }

    for flow in &flows {
        hierarchy.set_role(flow.destination, NodeRole::Sink);
    }
    for flow in &flows {
        // A node that both sends and receives keeps its sink role
        if hierarchy.node(flow.source).map(|n| n.role) != Some(NodeRole::Sink) {
            hierarchy.set_role(flow.source, NodeRole::Source);
        }
    }

    info!("Generated {} flows on port {}", flows.len(), params.port);
    Ok(TrafficPlan { flows, sinks, sources })
}

fn address_of(fabric: &Fabric, node: NodeId, top: bool) -> Result<Ipv4Addr, ConfigError> {
    let address = if top {
        fabric.top_address(node)
    } else {
        fabric.primary_address(node)
    };
    address.ok_or_else(|| {
        ConfigError::invalid("traffic.assignments", format!("node {} has no interface address", node))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RadioConfig;
    use crate::fabric::{install_fabric, ChannelParams, RecordingMedium};
    use crate::ip::AddressBlockAllocator;
    use crate::topology::{build_hierarchy, LayerDescriptor};

    fn setup(layers: &[LayerDescriptor]) -> (Hierarchy, Fabric) {
        let hierarchy = build_hierarchy(layers).unwrap();
        let mut allocator = AddressBlockAllocator::new(Ipv4Addr::new(10, 1, 1, 0), 24).unwrap();
        let fabric = install_fabric(
            &hierarchy,
            &ChannelParams::from_radio(&RadioConfig::default()),
            &mut allocator,
            &mut RecordingMedium::new(),
        )
        .unwrap();
        (hierarchy, fabric)
    }

    fn params(sinks: usize) -> TrafficParams {
        TrafficParams {
            sinks,
            port: 9,
            packet_size: 64,
            data_rate_bps: 2048,
            start_window: StartWindow { min: 100.0, max: 101.0 },
            assignments: Vec::new(),
            horizon: Duration::from_secs(200),
        }
    }

    #[test]
    fn test_default_pairs() {
        let (mut hierarchy, fabric) = setup(&[LayerDescriptor::new(6, 6)]);
        let mut stream = UniformStream::new(1);
        let plan = generate_traffic(&mut hierarchy, &fabric, &params(2), &mut stream).unwrap();

        assert_eq!(plan.flows.len(), 2);
        assert_eq!(plan.flows[0].destination, NodeId(0));
        assert_eq!(plan.flows[0].source, NodeId(35));
        assert_eq!(plan.flows[1].destination, NodeId(6));
        assert_eq!(plan.flows[1].source, NodeId(34));

        // Sinks bind their relay-domain address
        assert_eq!(plan.sinks[0].address, Ipv4Addr::new(10, 1, 7, 1));
        assert_eq!(plan.sinks[1].address, Ipv4Addr::new(10, 1, 7, 2));
        assert_eq!(plan.flows[0].five_tuple.source_address, Ipv4Addr::new(10, 1, 6, 6));
        assert_eq!(plan.flows[0].five_tuple.source_port, EPHEMERAL_PORT_START);
        assert_eq!(plan.flows[0].five_tuple.protocol, UDP_PROTOCOL);

        assert_eq!(hierarchy.node(NodeId(0)).unwrap().role, NodeRole::Sink);
        assert_eq!(hierarchy.node(NodeId(35)).unwrap().role, NodeRole::Source);
    }

    #[test]
    fn test_one_jitter_draw_per_flow() {
        let (mut hierarchy, fabric) = setup(&[LayerDescriptor::new(6, 6)]);
        let mut stream = UniformStream::new(1);
        let plan = generate_traffic(&mut hierarchy, &fabric, &params(3), &mut stream).unwrap();
        assert_eq!(stream.cursor().position(), 3);
        for source in &plan.sources {
            assert!(source.start >= Duration::from_secs(100) && source.start < Duration::from_secs(101));
            assert_eq!(source.stop, Duration::from_secs(200));
        }
    }

    #[test]
    fn test_too_many_sinks_fails() {
        let (mut hierarchy, fabric) = setup(&[LayerDescriptor::new(6, 6)]);
        let mut stream = UniformStream::new(1);
        let err = generate_traffic(&mut hierarchy, &fabric, &params(7), &mut stream).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { parameter: "traffic.sinks", .. }));
        assert_eq!(stream.cursor().position(), 0);
    }

    #[test]
    fn test_unrepresentable_start_time_fails() {
        let (mut hierarchy, fabric) = setup(&[LayerDescriptor::new(6, 6)]);
        let mut stream = UniformStream::new(1);
        let mut p = params(1);
        p.start_window = StartWindow { min: 1e20, max: 1e20 };
        let err = generate_traffic(&mut hierarchy, &fabric, &p, &mut stream).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { parameter: "traffic.start_window", .. }));
    }

    #[test]
    fn test_explicit_assignments() {
        let (mut hierarchy, fabric) = setup(&[LayerDescriptor::new(6, 6)]);
        let mut stream = UniformStream::new(1);
        let mut p = params(2);
        p.assignments = vec![
            FlowAssignment { sender: 3, sink: 12, port: None },
            FlowAssignment { sender: 3, sink: 18, port: Some(10) },
        ];
        let plan = generate_traffic(&mut hierarchy, &fabric, &p, &mut stream).unwrap();
        assert_eq!(plan.flows[0].port, 9);
        assert_eq!(plan.flows[1].port, 10);
        // Second socket on the same node gets the next ephemeral port
        assert_eq!(plan.flows[1].five_tuple.source_port, EPHEMERAL_PORT_START + 1);
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let (mut hierarchy, fabric) = setup(&[LayerDescriptor::new(6, 6)]);
        let mut stream = UniformStream::new(1);
        let mut p = params(2);
        p.assignments = vec![
            FlowAssignment { sender: 3, sink: 12, port: None },
            FlowAssignment { sender: 4, sink: 12, port: None },
        ];
        assert!(generate_traffic(&mut hierarchy, &fabric, &p, &mut stream).is_err());
    }
}
