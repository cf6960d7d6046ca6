//! Parameter sweeps.
//!
//! Runs one independent experiment per (protocol, transmit power) grid
//! point in parallel. Each experiment stays single-threaded and writes its
//! own output files, suffixed with the protocol and power.

use std::path::{Path, PathBuf};

use color_eyre::Result;
use log::info;
use rayon::prelude::*;

use crate::config::ExperimentConfig;
use crate::orchestrator::{run_experiment, ExperimentReport};
use crate::routing::{ProtocolSpec, RoutingProtocol};

/// One point of the sweep grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub protocol: RoutingProtocol,
    pub tx_power_dbm: f64,
}

impl SweepPoint {
    /// File-name suffix, e.g. `OLSR-7.5dBm`
    pub fn suffix(&self) -> String {
        format!("{}-{}dBm", self.protocol.name(), self.tx_power_dbm)
    }
}

/// Insert `-suffix` before the extension of a file name
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}-{}", stem, suffix),
    };
    path.with_file_name(name)
}

/// Resolve the grid. Empty lists fall back to the base configuration's
/// value. Unknown protocols fail before any experiment runs.
pub fn sweep_points(base: &ExperimentConfig, protocols: &[ProtocolSpec], tx_powers: &[f64]) -> Result<Vec<SweepPoint>> {
    let protocols: Vec<RoutingProtocol> = if protocols.is_empty() {
        vec![base.routing.protocol.resolve()?]
    } else {
        protocols.iter().map(|p| p.resolve()).collect::<Result<_, _>>()?
    };
    let tx_powers: Vec<f64> = if tx_powers.is_empty() {
        vec![base.radio.tx_power_dbm]
    } else {
        tx_powers.to_vec()
    };

    Ok(protocols
        .iter()
        .flat_map(|protocol| {
            tx_powers.iter().map(move |power| SweepPoint {
                protocol: *protocol,
                tx_power_dbm: *power,
            })
        })
        .collect())
}

/// Configuration of one grid point
pub fn point_config(base: &ExperimentConfig, point: &SweepPoint) -> ExperimentConfig {
    let mut config = base.clone();
    config.routing.protocol = point.protocol.into();
    config.radio.tx_power_dbm = point.tx_power_dbm;

    let suffix = point.suffix();
    config.output.csv = suffixed(&base.output.csv, &suffix);
    config.output.flow_stats = suffixed(&base.output.flow_stats, &suffix);
    config.output.mobility_trace = suffixed(&base.output.mobility_trace, &suffix);
    config
}

/// Run every grid point in parallel; reports come back in grid order
pub fn run_sweep(base: &ExperimentConfig, protocols: &[ProtocolSpec], tx_powers: &[f64]) -> Result<Vec<ExperimentReport>> {
    let points = sweep_points(base, protocols, tx_powers)?;
    info!("Running sweep of {} experiments in parallel...", points.len());

    let reports: Vec<ExperimentReport> = points
        .par_iter()
        .map(|point| {
            let config = point_config(base, point);
            log::debug!("Sweep point {}", point.suffix());
            run_experiment(&config)
        })
        .collect::<Result<_>>()?;

    info!("Sweep complete: {} experiments", reports.len());
    Ok(reports)
}
