//! Protocol selection state machine.
//!
//! `Unselected -> Selected -> Installed`. Selection validates the protocol
//! before any node is touched; installation runs the path of the selected
//! variant exactly once.

use log::info;

use crate::config::ConfigError;
use crate::topology::NodeId;

use super::stack::{NetworkStack, LIST_ROUTING_PRIORITY};
use super::{ProtocolSpec, RoutingProtocol};

/// Selector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Unselected,
    Selected(RoutingProtocol),
    Installed(RoutingProtocol),
}

#[derive(Debug)]
pub struct RoutingSelector {
    state: SelectorState,
}

impl Default for RoutingSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingSelector {
    pub fn new() -> Self {
        Self {
            state: SelectorState::Unselected,
        }
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    /// Selected or installed protocol
    pub fn protocol(&self) -> Option<RoutingProtocol> {
        match self.state {
            SelectorState::Unselected => None,
            SelectorState::Selected(p) | SelectorState::Installed(p) => Some(p),
        }
    }

    /// Resolve and select a protocol. Unknown ids and names are fatal.
    pub fn select(&mut self, spec: &ProtocolSpec) -> Result<RoutingProtocol, ConfigError> {
        if let SelectorState::Installed(p) = self.state {
            return Err(ConfigError::invalid(
                "routing.protocol",
                format!("{} is already installed", p),
            ));
        }
        let protocol = spec.resolve()?;
        self.state = SelectorState::Selected(protocol);
        Ok(protocol)
    }

    /// Install the selected protocol on `nodes`.
    ///
    /// OLSR, AODV and DSDV get the internet stack with one list-routing
    /// agent at priority 100. DSR gets the internet stack without list
    /// routing, then a DSR agent over the same nodes.
    pub fn install(&mut self, nodes: &[NodeId], stack: &mut dyn NetworkStack) -> Result<RoutingProtocol, ConfigError> {
        let protocol = match self.state {
            SelectorState::Selected(p) => p,
            SelectorState::Unselected => {
                return Err(ConfigError::invalid("routing.protocol", "no protocol selected"))
            }
            SelectorState::Installed(p) => return Err(ConfigError::invalid(
                "routing.protocol",
                format!("{} is already installed", p),
            )),
        };

        match protocol {
            RoutingProtocol::Olsr | RoutingProtocol::Aodv | RoutingProtocol::Dsdv => {
                stack.install_internet(nodes, Some((protocol, LIST_ROUTING_PRIORITY)))?;
            }
            RoutingProtocol::Dsr => {
                stack.install_internet(nodes, None)?;
                stack.install_dsr(nodes)?;
            }
        }

        self.state = SelectorState::Installed(protocol);
        info!("Installed {} routing on {} nodes", protocol, nodes.len());
        Ok(protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::StackRegistry;

    fn nodes() -> Vec<NodeId> {
        (0..12).map(NodeId).collect()
    }

    #[test]
    fn test_list_routing_protocols() {
        for id in 1..=3 {
            let mut selector = RoutingSelector::new();
            let mut stack = StackRegistry::new();
            let protocol = selector.select(&ProtocolSpec::Id(id)).unwrap();
            selector.install(&nodes(), &mut stack).unwrap();

            assert_eq!(selector.state(), SelectorState::Installed(protocol));
            assert_eq!(stack.len(), 12);
            for (_, node) in stack.iter() {
                assert!(node.internet);
                assert_eq!(node.list_routing, vec![(protocol, LIST_ROUTING_PRIORITY)]);
                assert!(!node.dsr_agent);
            }
        }
    }

    #[test]
    fn test_dsr_path() {
        let mut selector = RoutingSelector::new();
        let mut stack = StackRegistry::new();
        selector.select(&ProtocolSpec::Id(4)).unwrap();
        assert_eq!(selector.install(&nodes(), &mut stack).unwrap(), RoutingProtocol::Dsr);

        for (_, node) in stack.iter() {
            assert!(node.internet);
            assert!(node.list_routing.is_empty());
            assert!(node.dsr_agent);
        }
    }

    #[test]
    fn test_unknown_protocol_installs_nothing() {
        let mut selector = RoutingSelector::new();
        let mut stack = StackRegistry::new();
        assert_eq!(
            selector.select(&ProtocolSpec::Id(7)),
            Err(ConfigError::UnknownProtocol("7".to_string()))
        );
        assert_eq!(selector.state(), SelectorState::Unselected);
        assert!(selector.install(&nodes(), &mut stack).is_err());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_install_happens_once() {
        let mut selector = RoutingSelector::new();
        let mut stack = StackRegistry::new();
        selector.select(&ProtocolSpec::Name("olsr".to_string())).unwrap();
        selector.install(&nodes(), &mut stack).unwrap();
        assert!(selector.install(&nodes(), &mut stack).is_err());
        assert!(selector.select(&ProtocolSpec::Id(2)).is_err());
        assert_eq!(selector.protocol(), Some(RoutingProtocol::Olsr));
    }
}
