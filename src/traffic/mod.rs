//! Synthetic traffic: sender/sink pairing, constant-bit-rate sources and
//! counting sinks.

pub mod generator;
pub mod sink;
pub mod source;

pub use generator::{
    default_assignments, generate_traffic, FiveTuple, Flow, TrafficParams, TrafficPlan, EPHEMERAL_PORT_START,
    UDP_PROTOCOL,
};
pub use sink::{PacketSink, TickCounters};
pub use source::{OnOffSource, SourceState};
