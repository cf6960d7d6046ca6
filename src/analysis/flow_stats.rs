//! Post-run flow statistics.
//!
//! Walks the flow table, keeps flows whose source or destination port is
//! the experiment port and derives their throughput as
//! `rx_bytes * 8 / ((last_rx - first_tx) * 1024)` kbps. A flow with no
//! receive window gets [`FlowThroughput::Undefined`] instead of a division
//! by zero.

use std::fs;
use std::path::Path;
use std::time::Duration;

use color_eyre::eyre::{Context, Result};
use log::info;
use serde::Serialize;

use crate::traffic::FiveTuple;

use super::flow_monitor::{FlowId, FlowTable};

/// Derived throughput of one flow
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlowThroughput {
    Defined { kbps: f64 },
    /// Nothing received, or the window between first transmission and last
    /// reception is empty
    Undefined,
}

impl FlowThroughput {
    pub fn kbps(&self) -> Option<f64> {
        match self {
            FlowThroughput::Defined { kbps } => Some(*kbps),
            FlowThroughput::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, FlowThroughput::Undefined)
    }
}

/// Throughput over the window from first transmission to last reception
pub fn flow_throughput(rx_bytes: u64, first_tx: Option<Duration>, last_rx: Option<Duration>) -> FlowThroughput {
    match (first_tx, last_rx) {
        (Some(first), Some(last)) if last > first => {
            let window = (last - first).as_secs_f64();
            FlowThroughput::Defined {
                kbps: rx_bytes as f64 * 8.0 / (window * 1024.0),
            }
        }
        _ => FlowThroughput::Undefined,
    }
}

/// Run parameters recorded alongside the flows
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub protocol: String,
    pub tx_power_dbm: f64,
    pub sink_count: usize,
    pub seed: u64,
    pub horizon_secs: f64,
    pub port: u16,
    pub generated_at: String,
}

impl ReportMetadata {
    pub fn new(protocol: &str, tx_power_dbm: f64, sink_count: usize, seed: u64, horizon: Duration, port: u16) -> Self {
        Self {
            protocol: protocol.to_string(),
            tx_power_dbm,
            sink_count,
            seed,
            horizon_secs: horizon.as_secs_f64(),
            port,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Exported record of one flow
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub flow_id: FlowId,
    pub five_tuple: FiveTuple,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub lost_packets: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_tx_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_rx_secs: Option<f64>,
    pub delay_sum_secs: f64,
    pub throughput: FlowThroughput,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowSummary {
    pub matching_flows: usize,
    pub undefined_throughput: usize,
    pub total_tx_packets: u64,
    pub total_rx_packets: u64,
}

/// Full flow statistics export
#[derive(Debug, Clone, Serialize)]
pub struct FlowStatsReport {
    pub metadata: ReportMetadata,
    pub flows: Vec<FlowReport>,
    pub summary: FlowSummary,
}

/// Collect every flow touching `port` and log its summary
pub fn collect_flow_stats(table: &dyn FlowTable, port: u16, metadata: ReportMetadata) -> FlowStatsReport {
    let mut flows = Vec::new();
    let mut summary = FlowSummary::default();

    for id in table.flow_ids() {
        let (Some(tuple), Some(stats)) = (table.five_tuple(id), table.stats(id)) else {
            continue;
        };
        if tuple.source_port != port && tuple.destination_port != port {
            continue;
        }

        let throughput = flow_throughput(stats.rx_bytes, stats.first_tx, stats.last_rx);
        info!("Flow {} ({} -> {})", id, tuple.source_address, tuple.destination_address);
        info!("  Tx Packets:   {}", stats.tx_packets);
        info!("  Rx Packets:   {}", stats.rx_packets);
        match throughput.kbps() {
            Some(kbps) => info!("  Throughput:   {:.3} Kbps", kbps),
            None => info!("  Throughput:   undefined"),
        }

        summary.matching_flows += 1;
        summary.total_tx_packets += stats.tx_packets;
        summary.total_rx_packets += stats.rx_packets;
        if throughput.is_undefined() {
            summary.undefined_throughput += 1;
        }

        flows.push(FlowReport {
            flow_id: id,
            five_tuple: tuple,
            tx_packets: stats.tx_packets,
            tx_bytes: stats.tx_bytes,
            rx_packets: stats.rx_packets,
            rx_bytes: stats.rx_bytes,
            lost_packets: stats.lost_packets,
            first_tx_secs: stats.first_tx.map(|t| t.as_secs_f64()),
            last_rx_secs: stats.last_rx.map(|t| t.as_secs_f64()),
            delay_sum_secs: stats.delay_sum.as_secs_f64(),
            throughput,
        });
    }

    FlowStatsReport {
        metadata,
        flows,
        summary,
    }
}

/// Write the report as pretty JSON
pub fn write_flow_stats(report: &FlowStatsReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize flow statistics to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write flow statistics to {}", output_path.display()))?;

    info!("Flow statistics written to {}", output_path.display());
    Ok(())
}
