//! Shared utilities: data-rate and layer-descriptor parsing.

pub mod parse;

pub use parse::{parse_data_rate_bps, parse_layer};
