//! IP address allocation and management module.
//!
//! This module hands out one address block per wireless domain and keeps
//! the registry used to prove blocks and host addresses never collide.

pub mod allocator;
pub mod registry;

// Re-export commonly used types
pub use allocator::{AddressBlock, AddressBlockAllocator};
pub use registry::{AddressOwner, AddressRegistry};
