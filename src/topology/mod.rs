//! Network topology module.
//!
//! This module builds the clustered node hierarchy: nodes, the clusters they
//! are grouped into at each layer, and the relay sets formed by cluster heads.

pub mod builder;
pub mod types;

// Re-export key types and functions for easier access
pub use builder::{build_hierarchy, Hierarchy};
pub use types::{Cluster, ClusterId, Layer, LayerDescriptor, Node, NodeId, NodeRole};
