//! Experiment orchestrator.
//!
//! This module coordinates one experiment from configuration to persisted
//! outputs: build the hierarchy, install the wireless fabric, assign
//! mobility, install routing and generate traffic, then run the simulation
//! and write the throughput CSV, the flow statistics and the optional
//! mobility trace.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use serde::Serialize;

use crate::analysis::{
    collect_flow_stats, write_csv_header, write_flow_stats, FlowSummary, ReportMetadata, ThroughputSample,
    ThroughputSampler,
};
use crate::config::{ConfigError, ExperimentConfig};
use crate::fabric::{install_fabric, ChannelParams, Fabric, RecordingMedium};
use crate::ip::AddressBlockAllocator;
use crate::mobility::{substream, MobilityAssigner, MobilitySet, MobilityTraceWriter, RandomStreamCursor, UniformStream};
use crate::routing::{RoutingProtocol, RoutingSelector, StackRegistry};
use crate::sim::{IdealLink, RunSettings, RunStats, Simulation};
use crate::topology::{build_hierarchy, Hierarchy};
use crate::traffic::{generate_traffic, TrafficParams, TrafficPlan};
use crate::utils::parse_data_rate_bps;

/// Substream id of the link model's loss generator
const LINK_STREAM: u64 = u64::MAX - 1;

/// A fully built, not yet run experiment
#[derive(Debug)]
pub struct Experiment {
    pub protocol: RoutingProtocol,
    pub hierarchy: Hierarchy,
    pub fabric: Fabric,
    pub medium: RecordingMedium,
    pub stack: StackRegistry,
    pub mobility: MobilitySet,
    pub plan: TrafficPlan,
    /// Build stream cursor after the last draw
    pub cursor: RandomStreamCursor,
}

/// Build every component of an experiment.
///
/// All configuration errors surface here, before simulated time advances.
/// The protocol is resolved first so an unknown id aborts before any node
/// is created.
pub fn build_experiment(config: &ExperimentConfig) -> Result<Experiment, ConfigError> {
    config.validate()?;

    let mut selector = RoutingSelector::new();
    let protocol = selector.select(&config.routing.protocol)?;
    info!("Routing protocol: {}", protocol);

    let mut hierarchy = build_hierarchy(&config.topology.layers)?;

    let mut allocator = AddressBlockAllocator::new(config.topology.address_base, config.topology.prefix_len)?;
    let mut medium = RecordingMedium::new();
    let channel = ChannelParams::from_radio(&config.radio);
    let fabric = install_fabric(&hierarchy, &channel, &mut allocator, &mut medium)?;

    let mut stream = UniformStream::new(config.general.seed);
    let mobility = MobilityAssigner::new(config.general.seed).assign_fabric(&fabric, &config.mobility, &mut stream);

    let mut stack = StackRegistry::new();
    selector.install(&hierarchy.node_ids(), &mut stack)?;

    let data_rate_bps =
        parse_data_rate_bps(&config.traffic.data_rate).map_err(|e| ConfigError::invalid("traffic.data_rate", e))?;
    let params = TrafficParams {
        sinks: config.traffic.sinks,
        port: config.traffic.port,
        packet_size: config.traffic.packet_size,
        data_rate_bps,
        start_window: config.traffic.start_window,
        assignments: config.traffic.assignments.clone(),
        horizon: config.general.horizon,
    };
    let plan = generate_traffic(&mut hierarchy, &fabric, &params, &mut stream)?;

    let cursor = stream.finish();
    info!("Build complete, random stream cursor frozen at {}", cursor);

    Ok(Experiment {
        protocol,
        hierarchy,
        fabric,
        medium,
        stack,
        mobility,
        plan,
        cursor,
    })
}

/// Summary of one finished experiment
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub protocol: RoutingProtocol,
    pub tx_power_dbm: f64,
    pub sink_count: usize,
    pub csv_path: PathBuf,
    pub flow_stats_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobility_trace_path: Option<PathBuf>,
    pub samples: Vec<ThroughputSample>,
    pub flow_summary: FlowSummary,
    pub cursor: RandomStreamCursor,
    #[serde(skip)]
    pub run_stats: RunStats,
    /// Domain -> address block, in creation order
    pub address_blocks: Vec<String>,
    /// Initial position of every moving node
    #[serde(skip)]
    pub initial_positions: Vec<(u32, f64, f64)>,
    #[serde(skip)]
    pub sink_addresses: Vec<Ipv4Addr>,
}

/// Build and run one experiment, writing all outputs
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentReport> {
    let experiment = build_experiment(config)?;
    let Experiment {
        protocol,
        fabric,
        mobility,
        plan,
        cursor,
        ..
    } = experiment;

    let output = &config.output;
    fs::create_dir_all(&output.dir)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", output.dir.display()))?;

    let csv_path = output.csv_path();
    let mut csv = BufWriter::new(
        File::create(&csv_path).wrap_err_with(|| format!("Failed to create CSV file '{}'", csv_path.display()))?,
    );
    write_csv_header(&mut csv).wrap_err_with(|| format!("Failed to write CSV header to '{}'", csv_path.display()))?;

    let sink_count = plan.sink_count();
    let sink_addresses = plan.sinks.iter().map(|s| s.address).collect();
    let initial_positions = mobility
        .initial_positions()
        .into_iter()
        .map(|(node, p)| (node.0, p.x, p.y))
        .collect();
    let address_blocks = fabric
        .block_assignment()
        .into_iter()
        .map(|(domain, block)| format!("{}={}", domain, block))
        .collect();

    let sampler = ThroughputSampler::new(
        config.general.sample_interval,
        protocol.name(),
        config.radio.tx_power_dbm,
        sink_count,
        Some(csv),
    );
    let link = IdealLink::new(
        config.radio.link_delay,
        config.radio.loss_probability,
        substream(config.general.seed, LINK_STREAM),
    );
    let settings = RunSettings {
        horizon: config.general.horizon,
        sample_interval: config.general.sample_interval,
        max_delay: config.traffic.max_delay,
    };

    let mut simulation: Simulation<BufWriter<File>, BufWriter<File>> =
        Simulation::new(settings, plan, mobility, Box::new(link), sampler);

    let mobility_trace_path = if config.mobility.trace {
        let path = output.mobility_trace_path();
        let file = File::create(&path)
            .wrap_err_with(|| format!("Failed to create mobility trace '{}'", path.display()))?;
        simulation = simulation.with_mobility_trace(
            MobilityTraceWriter::new(BufWriter::new(file)),
            config.mobility.trace_interval,
        );
        Some(path)
    } else {
        None
    };

    let outcome = simulation
        .run()
        .wrap_err_with(|| format!("Failed to write run output to '{}'", output.dir.display()))?;
    if let Some(mut csv) = outcome.csv {
        csv.flush()
            .wrap_err_with(|| format!("Failed to flush CSV file '{}'", csv_path.display()))?;
    }
    if let (Some(mut trace), Some(path)) = (outcome.trace, &mobility_trace_path) {
        trace
            .flush()
            .wrap_err_with(|| format!("Failed to flush mobility trace '{}'", path.display()))?;
    }
    info!("Throughput log written to {} ({} rows)", csv_path.display(), outcome.samples.len());

    let metadata = ReportMetadata::new(
        protocol.name(),
        config.radio.tx_power_dbm,
        sink_count,
        config.general.seed,
        config.general.horizon,
        config.traffic.port,
    );
    let flow_report = collect_flow_stats(&outcome.monitor, config.traffic.port, metadata);
    let flow_stats_path = output.flow_stats_path();
    write_flow_stats(&flow_report, &flow_stats_path)?;

    Ok(ExperimentReport {
        protocol,
        tx_power_dbm: config.radio.tx_power_dbm,
        sink_count,
        csv_path,
        flow_stats_path,
        mobility_trace_path,
        samples: outcome.samples,
        flow_summary: flow_report.summary,
        cursor,
        run_stats: outcome.stats,
        address_blocks,
        initial_positions,
        sink_addresses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StartWindow;
    use crate::mobility::DRAWS_PER_NODE;
    use crate::routing::ProtocolSpec;
    use crate::topology::LayerDescriptor;

    #[test]
    fn test_build_reference_scenario() {
        let experiment = build_experiment(&ExperimentConfig::default()).unwrap();
        assert_eq!(experiment.protocol, RoutingProtocol::Olsr);
        assert_eq!(experiment.hierarchy.nodes.len(), 36);
        assert_eq!(experiment.fabric.domains.len(), 7);
        assert_eq!(experiment.stack.len(), 36);
        assert_eq!(experiment.plan.flows.len(), 3);
        // Mobility for 36 nodes, then one jitter draw per flow
        assert_eq!(experiment.cursor.position(), 36 * DRAWS_PER_NODE + 3);
    }

    #[test]
    fn test_unknown_protocol_aborts_build() {
        let mut config = ExperimentConfig::default();
        config.routing.protocol = ProtocolSpec::Id(9);
        assert_eq!(
            build_experiment(&config).unwrap_err(),
            ConfigError::UnknownProtocol("9".to_string())
        );
    }

    #[test]
    fn test_non_divisible_layers_abort_build() {
        let mut config = ExperimentConfig::default();
        config.topology.layers = vec![LayerDescriptor::new(6, 6), LayerDescriptor::new(1, 4)];
        assert!(matches!(
            build_experiment(&config),
            Err(ConfigError::NonDivisibleLayer { layer: 1, .. })
        ));
    }

    #[test]
    fn test_sub_nanosecond_send_interval_aborts_build() {
        let mut config = ExperimentConfig::default();
        config.traffic.data_rate = "1000Gbps".to_string();
        assert!(matches!(
            build_experiment(&config),
            Err(ConfigError::InvalidParameter { parameter: "traffic.data_rate", .. })
        ));
    }

    #[test]
    fn test_out_of_range_start_window_aborts_build() {
        let mut config = ExperimentConfig::default();
        config.traffic.start_window = StartWindow { min: 1e20, max: 1e20 };
        assert!(matches!(
            build_experiment(&config),
            Err(ConfigError::InvalidParameter { parameter: "traffic.start_window", .. })
        ));
    }

    #[test]
    fn test_dsr_build_has_no_list_routing() {
        let mut config = ExperimentConfig::default();
        config.routing.protocol = ProtocolSpec::Id(4);
        let experiment = build_experiment(&config).unwrap();
        for (_, node) in experiment.stack.iter() {
            assert!(node.dsr_agent);
            assert!(node.list_routing.is_empty());
        }
    }
}
