//! Wireless fabric installation.
//!
//! One wireless domain is created per cluster, plus one per layer for the
//! relay set of that layer's heads. Domains are enumerated layer by layer:
//! the layer's clusters in creation order, then its relay domain. Each
//! domain gets its own channel from the [`WirelessMedium`] and the next
//! address block from the allocator.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use log::{debug, info};
use serde::Serialize;

use crate::config::{ConfigError, RadioConfig};
use crate::ip::{AddressBlock, AddressBlockAllocator, AddressRegistry};
use crate::topology::{ClusterId, Hierarchy, NodeId};

/// Identifier of a wireless domain, in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DomainId(pub u32);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a domain connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    /// The members of one cluster
    Cluster { cluster: ClusterId, layer: usize },
    /// The heads of every cluster at one layer
    Relay { layer: usize },
}

impl DomainKind {
    pub fn layer(&self) -> usize {
        match self {
            DomainKind::Cluster { layer, .. } | DomainKind::Relay { layer } => *layer,
        }
    }
}

/// Radio parameters handed to the medium for every channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelParams {
    pub standard: String,
    pub phy_mode: String,
    /// Start and end transmit power, in dBm
    pub tx_power_dbm: f64,
    pub propagation_delay: String,
    pub propagation_loss: String,
    pub mac: String,
}

impl ChannelParams {
    pub fn from_radio(radio: &RadioConfig) -> Self {
        Self {
            standard: radio.standard.clone(),
            phy_mode: radio.phy_mode.clone(),
            tx_power_dbm: radio.tx_power_dbm,
            propagation_delay: "ConstantSpeed".to_string(),
            propagation_loss: "Friis".to_string(),
            mac: "Adhoc".to_string(),
        }
    }
}

/// A device created on one node for one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceHandle {
    pub node: NodeId,
    pub domain: DomainId,
    /// Channel the device is attached to
    pub channel: u32,
}

/// The radio/MAC collaborator: creates a channel and attaches one device per node
pub trait WirelessMedium {
    fn install_domain(&mut self, domain: DomainId, nodes: &[NodeId], channel: &ChannelParams) -> Vec<DeviceHandle>;
}

/// Medium that records the installed channels and devices
#[derive(Debug, Default)]
pub struct RecordingMedium {
    channels: Vec<ChannelParams>,
    devices: Vec<DeviceHandle>,
}

impl RecordingMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn devices(&self) -> &[DeviceHandle] {
        &self.devices
    }
}

impl WirelessMedium for RecordingMedium {
    fn install_domain(&mut self, domain: DomainId, nodes: &[NodeId], channel: &ChannelParams) -> Vec<DeviceHandle> {
        let channel_id = self.channels.len() as u32;
        self.channels.push(channel.clone());
        let devices: Vec<DeviceHandle> = nodes
            .iter()
            .map(|node| DeviceHandle {
                node: *node,
                domain,
                channel: channel_id,
            })
            .collect();
        self.devices.extend_from_slice(&devices);
        devices
    }
}

/// An installed wireless domain
#[derive(Debug, Clone, Serialize)]
pub struct NetworkDomain {
    pub id: DomainId,
    pub kind: DomainKind,
    pub nodes: Vec<NodeId>,
    pub block: AddressBlock,
    pub devices: Vec<DeviceHandle>,
}

/// One address held by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InterfaceAddress {
    pub domain: DomainId,
    pub address: Ipv4Addr,
}

/// The installed fabric: domains plus the per-node interface addresses
#[derive(Debug, Clone, Serialize)]
pub struct Fabric {
    pub domains: Vec<NetworkDomain>,
    /// Interfaces of each node, in domain-creation order
    pub interfaces: BTreeMap<NodeId, Vec<InterfaceAddress>>,
}

impl Fabric {
    /// Domain -> address block mapping, in creation order
    pub fn block_assignment(&self) -> Vec<(DomainId, AddressBlock)> {
        self.domains.iter().map(|d| (d.id, d.block)).collect()
    }

    /// Address of the node's first interface
    pub fn primary_address(&self, node: NodeId) -> Option<Ipv4Addr> {
        self.interfaces.get(&node).and_then(|i| i.first()).map(|i| i.address)
    }

    /// Address of the node in the highest-level domain it belongs to
    pub fn top_address(&self, node: NodeId) -> Option<Ipv4Addr> {
        self.interfaces.get(&node).and_then(|i| i.last()).map(|i| i.address)
    }

    pub fn addresses(&self, node: NodeId) -> &[InterfaceAddress] {
        self.interfaces.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cluster_domains(&self) -> impl Iterator<Item = &NetworkDomain> {
        self.domains
            .iter()
            .filter(|d| matches!(d.kind, DomainKind::Cluster { .. }))
    }
}

/// Enumerate the domains of a hierarchy in creation order
pub fn domain_descriptors(hierarchy: &Hierarchy) -> Vec<(DomainKind, Vec<NodeId>)> {
    let mut descriptors = Vec::new();
    for layer in &hierarchy.layers {
        for cluster_id in &layer.clusters {
            if let Some(cluster) = hierarchy.cluster(*cluster_id) {
                descriptors.push((
                    DomainKind::Cluster {
                        cluster: cluster.id,
                        layer: layer.index,
                    },
                    cluster.members.clone(),
                ));
            }
        }
        descriptors.push((DomainKind::Relay { layer: layer.index }, layer.relay_set.clone()));
    }
    descriptors
}

/// Install one domain per cluster and per relay set, assigning address
/// blocks in creation order.
///
/// Fails before returning if a domain outgrows its block, an address is
/// handed out twice, or any two blocks overlap.
pub fn install_fabric(
    hierarchy: &Hierarchy,
    channel: &ChannelParams,
    allocator: &mut AddressBlockAllocator,
    medium: &mut dyn WirelessMedium,
) -> Result<Fabric, ConfigError> {
    let mut registry = AddressRegistry::new();
    let mut domains = Vec::new();
    let mut interfaces: BTreeMap<NodeId, Vec<InterfaceAddress>> = BTreeMap::new();

    for (index, (kind, nodes)) in domain_descriptors(hierarchy).into_iter().enumerate() {
        let id = DomainId(index as u32);
        let block = allocator.next_block()?;
        if nodes.len() as u64 > block.host_capacity() {
            return Err(ConfigError::AddressBlockTooSmall {
                domain: id.0,
                nodes: nodes.len(),
                block: block.to_string(),
                capacity: block.host_capacity(),
            });
        }
        registry.register_block(id.0, block);

        let devices = medium.install_domain(id, &nodes, channel);
        for (host, node) in nodes.iter().enumerate() {
            // Capacity was checked above
            let address = block.host(host).ok_or_else(|| ConfigError::AddressBlockTooSmall {
                domain: id.0,
                nodes: nodes.len(),
                block: block.to_string(),
                capacity: block.host_capacity(),
            })?;
            registry.register_address(address, *node, id.0)?;
            interfaces
                .entry(*node)
                .or_default()
                .push(InterfaceAddress { domain: id, address });
        }

        debug!("Domain {} ({:?}): {} nodes on {}", id, kind, nodes.len(), block);
        domains.push(NetworkDomain {
            id,
            kind,
            nodes,
            block,
            devices,
        });
    }

    registry.verify_disjoint()?;

    info!(
        "Installed {} wireless domains, {} interface addresses",
        domains.len(),
        registry.address_count()
    );
    Ok(Fabric { domains, interfaces })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{build_hierarchy, LayerDescriptor};

    fn channel() -> ChannelParams {
        ChannelParams::from_radio(&RadioConfig::default())
    }

    fn install(layers: &[LayerDescriptor]) -> (Fabric, RecordingMedium) {
        let hierarchy = build_hierarchy(layers).unwrap();
        let mut allocator = AddressBlockAllocator::new(Ipv4Addr::new(10, 1, 1, 0), 24).unwrap();
        let mut medium = RecordingMedium::new();
        let fabric = install_fabric(&hierarchy, &channel(), &mut allocator, &mut medium).unwrap();
        (fabric, medium)
    }

    #[test]
    fn test_one_domain_per_cluster_plus_relay() {
        let (fabric, medium) = install(&[LayerDescriptor::new(6, 6)]);
        assert_eq!(fabric.domains.len(), 7);
        assert_eq!(medium.channel_count(), 7);
        assert_eq!(medium.devices().len(), 36 + 6);

        let relay = fabric.domains.last().unwrap();
        assert_eq!(relay.kind, DomainKind::Relay { layer: 0 });
        assert_eq!(relay.nodes.len(), 6);
        assert_eq!(relay.block.to_string(), "10.1.7.0/24");
    }

    #[test]
    fn test_addresses_follow_domain_order() {
        let (fabric, _) = install(&[LayerDescriptor::new(6, 6)]);
        assert_eq!(fabric.primary_address(NodeId(0)), Some(Ipv4Addr::new(10, 1, 1, 1)));
        assert_eq!(fabric.primary_address(NodeId(7)), Some(Ipv4Addr::new(10, 1, 2, 2)));

        // Heads also hold a relay address
        assert_eq!(fabric.addresses(NodeId(6)).len(), 2);
        assert_eq!(fabric.top_address(NodeId(6)), Some(Ipv4Addr::new(10, 1, 7, 2)));
        // Members only hold their cluster address
        assert_eq!(fabric.top_address(NodeId(7)), fabric.primary_address(NodeId(7)));
    }

    #[test]
    fn test_blocks_are_disjoint() {
        let (fabric, _) = install(&[LayerDescriptor::new(9, 4), LayerDescriptor::new(3, 3)]);
        // 9 + 1 domains at layer 0, 3 + 1 at layer 1
        assert_eq!(fabric.domains.len(), 14);
        let blocks = fabric.block_assignment();
        for (i, (_, a)) in blocks.iter().enumerate() {
            for (_, b) in &blocks[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn test_domain_larger_than_block_fails() {
        let hierarchy = build_hierarchy(&[LayerDescriptor::new(1, 8)]).unwrap();
        let mut allocator = AddressBlockAllocator::new(Ipv4Addr::new(10, 1, 1, 0), 30).unwrap();
        let mut medium = RecordingMedium::new();
        let err = install_fabric(&hierarchy, &channel(), &mut allocator, &mut medium).unwrap_err();
        assert!(matches!(err, ConfigError::AddressBlockTooSmall { domain: 0, nodes: 8, .. }));
    }
}
