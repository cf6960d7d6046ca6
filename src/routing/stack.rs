//! Network stack collaborator.
//!
//! The stack installs the internet layer on nodes, optionally with one
//! list-routing agent, and installs DSR agents. [`StackRegistry`] is the
//! in-process implementation: it records what each node received and never
//! runs protocol packet logic.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::config::ConfigError;
use crate::topology::NodeId;

use super::RoutingProtocol;

/// Priority of the list-routing agent
pub const LIST_ROUTING_PRIORITY: i16 = 100;

/// Installs routing capabilities on node sets
pub trait NetworkStack {
    /// Install the internet stack, with at most one list-routing agent
    fn install_internet(
        &mut self,
        nodes: &[NodeId],
        list_routing: Option<(RoutingProtocol, i16)>,
    ) -> Result<(), ConfigError>;

    /// Install a DSR agent over nodes that already carry an internet stack
    fn install_dsr(&mut self, nodes: &[NodeId]) -> Result<(), ConfigError>;
}

/// What one node received
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeStack {
    pub internet: bool,
    /// List-routing agents with their priority
    pub list_routing: Vec<(RoutingProtocol, i16)>,
    pub dsr_agent: bool,
}

/// Recording stack
#[derive(Debug, Default)]
pub struct StackRegistry {
    nodes: BTreeMap<NodeId, NodeStack>,
}

impl StackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, node: NodeId) -> Option<&NodeStack> {
        self.nodes.get(&node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeStack)> {
        self.nodes.iter()
    }
}

impl NetworkStack for StackRegistry {
    fn install_internet(
        &mut self,
        nodes: &[NodeId],
        list_routing: Option<(RoutingProtocol, i16)>,
    ) -> Result<(), ConfigError> {
        // Check the whole set first so a failure leaves nothing half-installed
        if let Some(node) = nodes.iter().find(|n| self.nodes.get(*n).is_some_and(|s| s.internet)) {
            return Err(ConfigError::DuplicateStackInstall(node.0));
        }
        for node in nodes {
            let stack = self.nodes.entry(*node).or_default();
            stack.internet = true;
            if let Some(agent) = list_routing {
                stack.list_routing.push(agent);
            }
        }
        debug!("Installed internet stack on {} nodes ({:?})", nodes.len(), list_routing);
        Ok(())
    }

    fn install_dsr(&mut self, nodes: &[NodeId]) -> Result<(), ConfigError> {
        for node in nodes {
            match self.nodes.get(node) {
                Some(stack) if stack.dsr_agent => return Err(ConfigError::DuplicateStackInstall(node.0)),
                Some(stack) if stack.internet => {}
                _ => {
                    return Err(ConfigError::invalid(
                        "routing.protocol",
                        format!("DSR agent requested on node {} without an internet stack", node),
                    ))
                }
            }
        }
        for node in nodes {
            if let Some(stack) = self.nodes.get_mut(node) {
                stack.dsr_agent = true;
            }
        }
        debug!("Installed DSR agent on {} nodes", nodes.len());
        Ok(())
    }
}
