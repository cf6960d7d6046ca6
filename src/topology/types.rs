//! Topology type definitions.
//!
//! This file contains the node, cluster and layer types that make up the
//! clustered hierarchy, plus the layer descriptors that drive its
//! construction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node. Creation order defines the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a cluster, unique across all layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One tier of the hierarchy as requested by the experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Number of clusters formed at this layer
    pub clusters: usize,
    /// Number of members per cluster, head included
    pub nodes_per_cluster: usize,
}

impl LayerDescriptor {
    pub fn new(clusters: usize, nodes_per_cluster: usize) -> Self {
        Self { clusters, nodes_per_cluster }
    }

    /// Number of member slots this descriptor describes, `None` on overflow
    pub fn capacity(&self) -> Option<usize> {
        self.clusters.checked_mul(self.nodes_per_cluster)
    }
}

impl fmt::Display for LayerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.clusters, self.nodes_per_cluster)
    }
}

/// Role a node plays in the experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Plain cluster member
    Member,
    /// Head of at least one cluster
    Head,
    /// Hosts a packet sink
    Sink,
    /// Hosts a traffic source
    Source,
}

/// A simulated node
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: NodeId,
    /// Cluster membership per layer: `clusters[k]` is the cluster at layer `k`.
    /// Only heads carry more than one entry.
    pub clusters: Vec<ClusterId>,
    pub role: NodeRole,
}

impl Node {
    /// Cluster this node belongs to at the given layer, if it participates there
    pub fn cluster_at(&self, layer: usize) -> Option<ClusterId> {
        self.clusters.get(layer).copied()
    }

    /// Highest layer index this node participates in
    pub fn top_layer(&self) -> usize {
        self.clusters.len().saturating_sub(1)
    }
}

/// A group of nodes sharing one wireless domain
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub id: ClusterId,
    /// Index of the layer this cluster belongs to
    pub layer: usize,
    /// Ordered member ids; the first member is the head
    pub members: Vec<NodeId>,
}

impl Cluster {
    /// The designated head (first member)
    pub fn head(&self) -> NodeId {
        self.members[0]
    }
}

/// One tier of the built hierarchy
#[derive(Debug, Clone, Serialize)]
pub struct Layer {
    pub index: usize,
    pub descriptor: LayerDescriptor,
    /// Clusters of this layer, in creation order
    pub clusters: Vec<ClusterId>,
    /// Heads of this layer's clusters, in cluster order. This is the
    /// membership fed into the next layer up.
    pub relay_set: Vec<NodeId>,
}
