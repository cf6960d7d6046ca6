//! Measurement for routing experiments.
//!
//! This module provides the periodic throughput sampler, the flow monitor
//! that classifies packets into flows, and the post-run flow statistics
//! collector with its JSON export.

pub mod flow_monitor;
pub mod flow_stats;
pub mod throughput;

pub use flow_monitor::{FlowId, FlowMonitor, FlowStats, FlowTable};
pub use flow_stats::{
    collect_flow_stats, flow_throughput, write_flow_stats, FlowReport, FlowStatsReport, FlowSummary, FlowThroughput,
    ReportMetadata,
};
pub use throughput::{bytes_to_kbps, write_csv_header, ThroughputSample, ThroughputSampler, CSV_HEADER};
