//! IP address registry.
//!
//! Tracks every block handed to a domain and every host address handed to a
//! node, so the fabric can prove before the run that no two domains share
//! address space and no address is assigned twice.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::config::ConfigError;
use crate::topology::NodeId;

use super::allocator::AddressBlock;

/// Owner of an assigned host address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressOwner {
    pub node: NodeId,
    pub domain: u32,
}

/// Registry of assigned blocks and host addresses
#[derive(Debug, Default)]
pub struct AddressRegistry {
    /// Blocks in assignment order, keyed by domain id
    blocks: Vec<(u32, AddressBlock)>,
    /// Host address -> owner
    assigned: HashMap<Ipv4Addr, AddressOwner>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the block assigned to a domain
    pub fn register_block(&mut self, domain: u32, block: AddressBlock) {
        self.blocks.push((domain, block));
    }

    /// Record a host address, rejecting duplicates
    pub fn register_address(&mut self, addr: Ipv4Addr, node: NodeId, domain: u32) -> Result<(), ConfigError> {
        if let Some(existing) = self.assigned.get(&addr) {
            return Err(ConfigError::DuplicateAddress {
                address: addr,
                first_node: existing.node.0,
                second_node: node.0,
            });
        }
        self.assigned.insert(addr, AddressOwner { node, domain });
        Ok(())
    }

    /// Owner of an address, if assigned
    pub fn owner_of(&self, addr: Ipv4Addr) -> Option<AddressOwner> {
        self.assigned.get(&addr).copied()
    }

    pub fn address_count(&self) -> usize {
        self.assigned.len()
    }

    /// Verify that no two registered blocks overlap
    pub fn verify_disjoint(&self) -> Result<(), ConfigError> {
        for (i, (first, first_block)) in self.blocks.iter().enumerate() {
            for (second, second_block) in &self.blocks[i + 1..] {
                if first_block.overlaps(second_block) {
                    return Err(ConfigError::OverlappingAddressBlocks {
                        first: *first,
                        first_block: first_block.to_string(),
                        second: *second,
                        second_block: second_block.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_address_rejected() {
        let mut registry = AddressRegistry::new();
        let addr = Ipv4Addr::new(10, 1, 1, 1);
        registry.register_address(addr, NodeId(0), 0).unwrap();
        assert_eq!(
            registry.register_address(addr, NodeId(3), 1),
            Err(ConfigError::DuplicateAddress {
                address: addr,
                first_node: 0,
                second_node: 3
            })
        );
        assert_eq!(registry.owner_of(addr).unwrap().node, NodeId(0));
        assert_eq!(registry.address_count(), 1);
    }

    #[test]
    fn test_overlapping_blocks_detected() {
        let mut registry = AddressRegistry::new();
        registry.register_block(0, AddressBlock::new(Ipv4Addr::new(10, 1, 1, 0), 24));
        registry.register_block(1, AddressBlock::new(Ipv4Addr::new(10, 1, 2, 0), 24));
        assert!(registry.verify_disjoint().is_ok());

        registry.register_block(2, AddressBlock::new(Ipv4Addr::new(10, 1, 0, 0), 16));
        match registry.verify_disjoint() {
            Err(ConfigError::OverlappingAddressBlocks { first, second, .. }) => {
                assert_eq!(first, 0);
                assert_eq!(second, 2);
            }
            other => panic!("expected overlap error, got {:?}", other),
        }
    }
}
