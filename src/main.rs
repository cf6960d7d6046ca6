use clap::Parser;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use manetsim::config_loader::{self, CliOverrides};
use manetsim::orchestrator;
use manetsim::routing::ProtocolSpec;
use manetsim::sweep;
use manetsim::topology::LayerDescriptor;
use manetsim::utils::parse_layer;

/// Routing protocol comparison over clustered mobile ad hoc networks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the experiment configuration YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name of the throughput CSV file
    #[arg(long)]
    csv_file_name: Option<PathBuf>,

    /// Routing protocol: 1=OLSR, 2=AODV, 3=DSDV, 4=DSR, or a name
    #[arg(long)]
    protocol: Option<ProtocolSpec>,

    /// Write a mobility position trace
    #[arg(long)]
    trace_mobility: bool,

    /// Simulated time horizon, e.g. "200s"
    #[arg(long, value_parser = humantime::parse_duration)]
    horizon: Option<Duration>,

    /// Layer descriptors, bottom first, e.g. "6x6" or "9x4,3x3"
    #[arg(long, value_delimiter = ',', value_parser = parse_layer)]
    layers: Vec<LayerDescriptor>,

    /// Transmit power in dBm
    #[arg(long)]
    tx_power: Option<f64>,

    /// Number of sender/sink pairs
    #[arg(long)]
    sinks: Option<usize>,

    /// Seed of the random stream
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for all output files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Run a sweep over these protocols (comma separated)
    #[arg(long, value_delimiter = ',')]
    sweep_protocols: Vec<ProtocolSpec>,

    /// Run a sweep over these transmit powers in dBm (comma separated)
    #[arg(long, value_delimiter = ',')]
    sweep_tx_powers: Vec<f64>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            csv_file_name: self.csv_file_name.clone(),
            protocol: self.protocol.clone(),
            trace_mobility: self.trace_mobility,
            horizon: self.horizon,
            layers: (!self.layers.is_empty()).then(|| self.layers.clone()),
            tx_power: self.tx_power,
            sinks: self.sinks,
            seed: self.seed,
            output_dir: self.output_dir.clone(),
        }
    }

    fn is_sweep(&self) -> bool {
        !self.sweep_protocols.is_empty() || !self.sweep_tx_powers.is_empty()
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Load the configuration before logging starts so its log level can apply
    let config = config_loader::load_or_default(args.config.as_deref());

    // Initialize logging; RUST_LOG wins over the configured level
    let default_filter = config
        .as_ref()
        .ok()
        .and_then(|c| c.general.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let mut config = config?;
    config_loader::apply_overrides(&mut config, &args.overrides())?;

    info!("Starting manetsim");
    info!("Output directory: {:?}", config.output.dir);

    if args.is_sweep() {
        let reports = sweep::run_sweep(&config, &args.sweep_protocols, &args.sweep_tx_powers)?;
        for report in &reports {
            info!(
                "{} at {} dBm: {} samples, {} flows ({} undefined) -> {}",
                report.protocol,
                report.tx_power_dbm,
                report.samples.len(),
                report.flow_summary.matching_flows,
                report.flow_summary.undefined_throughput,
                report.csv_path.display()
            );
        }
    } else {
        let report = orchestrator::run_experiment(&config)?;
        info!(
            "{} run complete: {} samples in {}, flow statistics in {}",
            report.protocol,
            report.samples.len(),
            report.csv_path.display(),
            report.flow_stats_path.display()
        );
        if let Some(trace) = &report.mobility_trace_path {
            info!("Mobility trace in {}", trace.display());
        }
    }

    Ok(())
}
