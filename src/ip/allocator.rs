//! Address block allocation.
//!
//! Domains receive consecutive, equally sized IPv4 blocks starting at a
//! configurable base (`10.1.1.0/24`, `10.1.2.0/24`, ...). Hosts inside a
//! block are numbered from `.1` in the order the domain lists its nodes.

use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::config::ConfigError;

/// An IPv4 network block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AddressBlock {
    pub network: Ipv4Addr,
    pub prefix_len: u8,
}

impl AddressBlock {
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Self {
        Self { network, prefix_len }
    }

    /// Number of addresses covered, network and broadcast included
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_len))
    }

    /// Usable host addresses
    pub fn host_capacity(&self) -> u64 {
        self.size().saturating_sub(2)
    }

    fn first(&self) -> u64 {
        u64::from(u32::from(self.network))
    }

    fn last(&self) -> u64 {
        self.first() + self.size() - 1
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let addr = u64::from(u32::from(addr));
        addr >= self.first() && addr <= self.last()
    }

    pub fn overlaps(&self, other: &AddressBlock) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }

    /// The `index`-th host address (0-based, so index 0 is `.1`)
    pub fn host(&self, index: usize) -> Option<Ipv4Addr> {
        let offset = index as u64 + 1;
        if offset > self.host_capacity() {
            return None;
        }
        Some(Ipv4Addr::from((self.first() + offset) as u32))
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// Hands out consecutive blocks of one prefix length
#[derive(Debug)]
pub struct AddressBlockAllocator {
    base: Ipv4Addr,
    prefix_len: u8,
    next: u64,
    allocated: usize,
}

impl AddressBlockAllocator {
    /// Create an allocator whose first block starts at `base`.
    ///
    /// `base` must be aligned to `prefix_len`.
    pub fn new(base: Ipv4Addr, prefix_len: u8) -> Result<Self, ConfigError> {
        if !(1..=30).contains(&prefix_len) {
            return Err(ConfigError::invalid(
                "topology.prefix_len",
                format!("{} leaves no room for hosts", prefix_len),
            ));
        }
        let block = AddressBlock::new(base, prefix_len);
        if block.first() % block.size() != 0 {
            return Err(ConfigError::invalid(
                "topology.address_base",
                format!("{} is not aligned to /{}", base, prefix_len),
            ));
        }
        Ok(Self {
            base,
            prefix_len,
            next: block.first(),
            allocated: 0,
        })
    }

    /// Next free block
    pub fn next_block(&mut self) -> Result<AddressBlock, ConfigError> {
        let size = 1u64 << (32 - u32::from(self.prefix_len));
        if self.next + size - 1 > u64::from(u32::MAX) {
            return Err(ConfigError::AddressSpaceExhausted {
                base: self.base,
                prefix_len: self.prefix_len,
                allocated: self.allocated,
            });
        }
        let block = AddressBlock::new(Ipv4Addr::from(self.next as u32), self.prefix_len);
        self.next += size;
        self.allocated += 1;
        Ok(block)
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_blocks() {
        let mut allocator = AddressBlockAllocator::new(Ipv4Addr::new(10, 1, 1, 0), 24).unwrap();
        let first = allocator.next_block().unwrap();
        let second = allocator.next_block().unwrap();
        assert_eq!(first.to_string(), "10.1.1.0/24");
        assert_eq!(second.to_string(), "10.1.2.0/24");
        assert!(!first.overlaps(&second));
        assert_eq!(allocator.allocated(), 2);
    }

    #[test]
    fn test_block_rolls_into_next_octet() {
        let mut allocator = AddressBlockAllocator::new(Ipv4Addr::new(10, 1, 255, 0), 24).unwrap();
        allocator.next_block().unwrap();
        assert_eq!(allocator.next_block().unwrap().network, Ipv4Addr::new(10, 2, 0, 0));
    }

    #[test]
    fn test_host_numbering() {
        let block = AddressBlock::new(Ipv4Addr::new(10, 1, 3, 0), 24);
        assert_eq!(block.host(0), Some(Ipv4Addr::new(10, 1, 3, 1)));
        assert_eq!(block.host(253), Some(Ipv4Addr::new(10, 1, 3, 254)));
        assert_eq!(block.host(254), None);
        assert_eq!(block.host_capacity(), 254);
        assert!(block.contains(Ipv4Addr::new(10, 1, 3, 77)));
        assert!(!block.contains(Ipv4Addr::new(10, 1, 4, 1)));
    }

    #[test]
    fn test_overlap_detection() {
        let wide = AddressBlock::new(Ipv4Addr::new(10, 1, 0, 0), 16);
        let narrow = AddressBlock::new(Ipv4Addr::new(10, 1, 7, 0), 24);
        let outside = AddressBlock::new(Ipv4Addr::new(10, 2, 0, 0), 24);
        assert!(wide.overlaps(&narrow));
        assert!(narrow.overlaps(&wide));
        assert!(!wide.overlaps(&outside));
    }

    #[test]
    fn test_misaligned_base_rejected() {
        let err = AddressBlockAllocator::new(Ipv4Addr::new(10, 1, 1, 5), 24).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter { parameter: "topology.address_base", .. }
        ));
    }

    #[test]
    fn test_exhaustion() {
        let mut allocator = AddressBlockAllocator::new(Ipv4Addr::new(255, 255, 255, 0), 24).unwrap();
        allocator.next_block().unwrap();
        assert!(matches!(
            allocator.next_block(),
            Err(ConfigError::AddressSpaceExhausted { allocated: 1, .. })
        ));
    }
}
