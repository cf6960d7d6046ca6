//! Node mobility.
//!
//! This module provides the random waypoint motion model, the shared
//! random-stream cursor used to draw initial positions reproducibly, the
//! assigner that attaches processes to wireless domains, and the optional
//! position trace writer.

pub mod assigner;
pub mod stream;
pub mod trace;
pub mod waypoint;

pub use assigner::{MobilityAssigner, MobilityParams, MobilitySet, DRAWS_PER_NODE};
pub use stream::{substream, RandomStreamCursor, UniformStream};
pub use trace::MobilityTraceWriter;
pub use waypoint::{RandomWaypoint, Region, Vector};
