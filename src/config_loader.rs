use crate::config::ExperimentConfig;
use crate::routing::ProtocolSpec;
use crate::topology::LayerDescriptor;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load and parse an experiment configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<ExperimentConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file '{}'", config_path.display()))?;

    let config: ExperimentConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Load the file if one is given, otherwise start from the reference scenario
pub fn load_or_default(config_path: Option<&Path>) -> Result<ExperimentConfig> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using the reference scenario");
            Ok(ExperimentConfig::default())
        }
    }
}

/// Command-line values that override the configuration file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub csv_file_name: Option<PathBuf>,
    pub protocol: Option<ProtocolSpec>,
    pub trace_mobility: bool,
    pub horizon: Option<Duration>,
    pub layers: Option<Vec<LayerDescriptor>>,
    pub tx_power: Option<f64>,
    pub sinks: Option<usize>,
    pub seed: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

/// Apply CLI overrides to a configuration and re-validate it
pub fn apply_overrides(config: &mut ExperimentConfig, overrides: &CliOverrides) -> Result<()> {
    if let Some(csv) = &overrides.csv_file_name {
        info!("CSV file override: {}", csv.display());
        config.output.csv = csv.clone();
    }
    if let Some(protocol) = &overrides.protocol {
        info!("Routing protocol override: {}", protocol);
        config.routing.protocol = protocol.clone();
    }
    if overrides.trace_mobility {
        config.mobility.trace = true;
    }
    if let Some(horizon) = overrides.horizon {
        config.general.horizon = horizon;
    }
    if let Some(layers) = &overrides.layers {
        config.topology.layers = layers.clone();
    }
    if let Some(tx_power) = overrides.tx_power {
        config.radio.tx_power_dbm = tx_power;
    }
    if let Some(sinks) = overrides.sinks {
        config.traffic.sinks = sinks;
    }
    if let Some(seed) = overrides.seed {
        config.general.seed = seed;
    }
    if let Some(dir) = &overrides.output_dir {
        config.output.dir = dir.clone();
    }

    config.validate()?;

    Ok(())
}
