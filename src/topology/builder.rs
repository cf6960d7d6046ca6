//! Cluster hierarchy construction.
//!
//! The bottom layer creates `clusters * nodes_per_cluster` nodes and cuts
//! them into contiguous groups; the first node of each group is its head.
//! Heads of layer `k` are the membership clustered at layer `k + 1`, until
//! the descriptors run out.

use log::{debug, info};
use serde::Serialize;

use crate::config::ConfigError;

use super::types::{Cluster, ClusterId, Layer, LayerDescriptor, Node, NodeId, NodeRole};

/// The built node/cluster/layer hierarchy
#[derive(Debug, Clone, Serialize)]
pub struct Hierarchy {
    /// Indexed by `NodeId`
    pub nodes: Vec<Node>,
    /// Indexed by `ClusterId`; bottom-layer clusters come first
    pub clusters: Vec<Cluster>,
    pub layers: Vec<Layer>,
}

impl Hierarchy {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0 as usize)
    }

    /// All node ids in creation order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Nodes of the bottom layer (every node in the hierarchy)
    pub fn leaf_nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Heads of the given layer's clusters
    pub fn relay_set(&self, layer: usize) -> Option<&[NodeId]> {
        self.layers.get(layer).map(|l| l.relay_set.as_slice())
    }

    /// Heads of the given layer's clusters, in cluster order
    pub fn heads(&self, layer: usize) -> Vec<NodeId> {
        self.clusters_in_layer(layer).map(Cluster::head).collect()
    }

    /// Relay set of the highest layer
    pub fn top_relay_set(&self) -> &[NodeId] {
        self.layers.last().map(|l| l.relay_set.as_slice()).unwrap_or(&[])
    }

    /// Cluster `node` belongs to at `layer`
    pub fn cluster_of(&self, node: NodeId, layer: usize) -> Option<&Cluster> {
        self.node(node)
            .and_then(|n| n.cluster_at(layer))
            .and_then(|c| self.cluster(c))
    }

    /// Clusters of one layer, in creation order
    pub fn clusters_in_layer(&self, layer: usize) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(move |c| c.layer == layer)
    }

    pub(crate) fn set_role(&mut self, node: NodeId, role: NodeRole) {
        if let Some(n) = self.nodes.get_mut(node.index()) {
            n.role = role;
        }
    }
}

/// Build the hierarchy for the given layer descriptors, bottom layer first.
///
/// # Errors
/// * `EmptyLayers` when no descriptor is given
/// * `InvalidLayer` for a zero count or size, or an upper layer whose cluster
///   count disagrees with its membership
/// * `NonDivisibleLayer` when a layer's membership cannot be cut into
///   clusters of the requested size
pub fn build_hierarchy(descriptors: &[LayerDescriptor]) -> Result<Hierarchy, ConfigError> {
    let bottom = descriptors.first().ok_or(ConfigError::EmptyLayers)?;
    for (layer, descriptor) in descriptors.iter().enumerate() {
        if descriptor.clusters == 0 || descriptor.nodes_per_cluster == 0 {
            return Err(ConfigError::InvalidLayer {
                layer,
                descriptor: *descriptor,
                reason: "cluster count and cluster size must be positive".to_string(),
            });
        }
    }

    let node_count = bottom
        .capacity()
        .and_then(|total| u32::try_from(total).ok())
        .ok_or_else(|| ConfigError::InvalidLayer {
            layer: 0,
            descriptor: *bottom,
            reason: "node count exceeds the node id space".to_string(),
        })?;

    let nodes: Vec<Node> = (0..node_count)
        .map(|id| Node {
            id: NodeId(id),
            clusters: Vec::with_capacity(descriptors.len()),
            role: NodeRole::Member,
        })
        .collect();

    let mut hierarchy = Hierarchy {
        nodes,
        clusters: Vec::new(),
        layers: Vec::with_capacity(descriptors.len()),
    };

    let mut membership: Vec<NodeId> = hierarchy.node_ids();
    for (index, descriptor) in descriptors.iter().enumerate() {
        membership = cluster_layer(&mut hierarchy, index, *descriptor, &membership)?;
    }

    info!(
        "Built hierarchy: {} nodes, {} clusters across {} layers",
        hierarchy.nodes.len(),
        hierarchy.clusters.len(),
        hierarchy.layers.len()
    );
    Ok(hierarchy)
}

/// Cluster one layer's membership and return its relay set
fn cluster_layer(
    hierarchy: &mut Hierarchy,
    index: usize,
    descriptor: LayerDescriptor,
    membership: &[NodeId],
) -> Result<Vec<NodeId>, ConfigError> {
    let size = descriptor.nodes_per_cluster;
    if membership.len() % size != 0 {
        return Err(ConfigError::NonDivisibleLayer {
            layer: index,
            members: membership.len(),
            nodes_per_cluster: size,
        });
    }
    let derived = membership.len() / size;
    if derived != descriptor.clusters {
        return Err(ConfigError::InvalidLayer {
            layer: index,
            descriptor,
            reason: format!(
                "{} members form {} clusters of {}, not {}",
                membership.len(),
                derived,
                size,
                descriptor.clusters
            ),
        });
    }

    let mut layer = Layer {
        index,
        descriptor,
        clusters: Vec::with_capacity(derived),
        relay_set: Vec::with_capacity(derived),
    };

    for group in membership.chunks(size) {
        let id = ClusterId(hierarchy.clusters.len() as u32);
        for member in group {
            let node = &mut hierarchy.nodes[member.index()];
            debug_assert_eq!(node.clusters.len(), index, "node {} skipped a layer", member);
            node.clusters.push(id);
        }

        let head = group[0];
        hierarchy.nodes[head.index()].role = NodeRole::Head;
        debug!("Layer {} cluster {}: head {} with {} members", index, id, head, group.len());

        hierarchy.clusters.push(Cluster {
            id,
            layer: index,
            members: group.to_vec(),
        });
        layer.clusters.push(id);
        layer.relay_set.push(head);
    }

    let relay_set = layer.relay_set.clone();
    hierarchy.layers.push(layer);
    Ok(relay_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_single_layer_six_by_six() {
        let hierarchy = build_hierarchy(&[LayerDescriptor::new(6, 6)]).unwrap();

        assert_eq!(hierarchy.nodes.len(), 36);
        assert_eq!(hierarchy.clusters.len(), 6);

        let mut seen = HashSet::new();
        for cluster in &hierarchy.clusters {
            assert_eq!(cluster.members.len(), 6);
            for member in &cluster.members {
                assert!(seen.insert(*member), "node {} is in two clusters", member);
            }
        }
        assert_eq!(seen.len(), 36);

        let relay = hierarchy.top_relay_set();
        assert_eq!(relay.len(), 6);
        assert_eq!(relay, &[NodeId(0), NodeId(6), NodeId(12), NodeId(18), NodeId(24), NodeId(30)]);
    }

    #[test]
    fn test_contiguous_groups_and_heads() {
        let hierarchy = build_hierarchy(&[LayerDescriptor::new(9, 4)]).unwrap();
        let second = &hierarchy.clusters[1];
        assert_eq!(second.members, vec![NodeId(4), NodeId(5), NodeId(6), NodeId(7)]);
        assert_eq!(second.head(), NodeId(4));
        assert_eq!(hierarchy.node(NodeId(4)).unwrap().role, NodeRole::Head);
        assert_eq!(hierarchy.node(NodeId(5)).unwrap().role, NodeRole::Member);
    }

    #[test]
    fn test_head_promotion_to_next_layer() {
        let hierarchy =
            build_hierarchy(&[LayerDescriptor::new(9, 4), LayerDescriptor::new(3, 3)]).unwrap();

        assert_eq!(hierarchy.layers.len(), 2);
        assert_eq!(hierarchy.clusters.len(), 12);

        // Every layer-0 head is a member of exactly one layer-1 cluster
        for head in hierarchy.relay_set(0).unwrap() {
            let upper = hierarchy.cluster_of(*head, 1).unwrap();
            assert_eq!(upper.layer, 1);
            assert!(upper.members.contains(head));
        }

        // Non-heads stay in layer 0 only
        let member = hierarchy.node(NodeId(1)).unwrap();
        assert_eq!(member.clusters.len(), 1);
        assert_eq!(member.top_layer(), 0);

        // Layer-1 clusters group the heads 0,4,8 / 12,16,20 / 24,28,32
        let first_upper = hierarchy.clusters_in_layer(1).next().unwrap();
        assert_eq!(first_upper.members, vec![NodeId(0), NodeId(4), NodeId(8)]);
        assert_eq!(hierarchy.top_relay_set(), &[NodeId(0), NodeId(12), NodeId(24)]);
        assert_eq!(hierarchy.heads(1), hierarchy.top_relay_set().to_vec());
        assert_eq!(hierarchy.heads(0).len(), 9);
    }

    #[test]
    fn test_non_divisible_layer_fails() {
        let err = build_hierarchy(&[LayerDescriptor::new(6, 6), LayerDescriptor::new(1, 4)]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NonDivisibleLayer {
                layer: 1,
                members: 6,
                nodes_per_cluster: 4
            }
        );
    }

    #[test]
    fn test_inconsistent_cluster_count_fails() {
        let err = build_hierarchy(&[LayerDescriptor::new(6, 6), LayerDescriptor::new(2, 2)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLayer { layer: 1, .. }));
    }

    #[test]
    fn test_empty_and_zero_descriptors_fail() {
        assert_eq!(build_hierarchy(&[]).unwrap_err(), ConfigError::EmptyLayers);
        assert!(matches!(
            build_hierarchy(&[LayerDescriptor::new(0, 6)]),
            Err(ConfigError::InvalidLayer { layer: 0, .. })
        ));
    }

    #[test]
    fn test_oversized_bottom_layer_fails() {
        let err = build_hierarchy(&[LayerDescriptor::new(usize::MAX / 2, 3)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLayer { layer: 0, .. }));
        assert!(err.to_string().contains("node id space"));

        // Fits in usize but not in the u32 id space
        assert!(matches!(
            build_hierarchy(&[LayerDescriptor::new(1 << 20, 1 << 13)]),
            Err(ConfigError::InvalidLayer { layer: 0, .. })
        ));
    }

    #[test]
    fn test_build_is_deterministic() {
        let layers = [LayerDescriptor::new(8, 3), LayerDescriptor::new(2, 4)];
        let a = build_hierarchy(&layers).unwrap();
        let b = build_hierarchy(&layers).unwrap();
        let members_a: Vec<_> = a.clusters.iter().map(|c| c.members.clone()).collect();
        let members_b: Vec<_> = b.clusters.iter().map(|c| c.members.clone()).collect();
        assert_eq!(members_a, members_b);
    }
}
