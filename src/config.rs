//! Experiment configuration.
//!
//! Type-safe configuration structures for one routing experiment, loaded
//! from YAML and overridable from the command line. Every field has a default
//! that reproduces the reference scenario: 6 clusters of 6 nodes in a
//! 500 m x 500 m area, OLSR, 7.5 dBm transmit power and a 200 s horizon.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mobility::Region;
use crate::routing::ProtocolSpec;
use crate::topology::LayerDescriptor;
use crate::utils::parse_data_rate_bps;

/// Fatal configuration errors.
///
/// Every variant names the offending parameter. All of them are raised
/// before simulated time advances.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid routing protocol '{0}': expected 1=OLSR, 2=AODV, 3=DSDV or 4=DSR")]
    UnknownProtocol(String),
    #[error("Invalid topology: at least one layer descriptor is required")]
    EmptyLayers,
    #[error("Invalid layer descriptor {descriptor} at layer {layer}: {reason}")]
    InvalidLayer {
        layer: usize,
        descriptor: LayerDescriptor,
        reason: String,
    },
    #[error("Layer {layer} has {members} members, not divisible by nodes_per_cluster={nodes_per_cluster}")]
    NonDivisibleLayer {
        layer: usize,
        members: usize,
        nodes_per_cluster: usize,
    },
    #[error("Address blocks overlap: domain {first} uses {first_block}, domain {second} uses {second_block}")]
    OverlappingAddressBlocks {
        first: u32,
        first_block: String,
        second: u32,
        second_block: String,
    },
    #[error("Address {address} assigned twice (node {first_node} and node {second_node})")]
    DuplicateAddress {
        address: Ipv4Addr,
        first_node: u32,
        second_node: u32,
    },
    #[error("Domain {domain} has {nodes} nodes but address block {block} holds only {capacity} hosts")]
    AddressBlockTooSmall {
        domain: u32,
        nodes: usize,
        block: String,
        capacity: u64,
    },
    #[error("Address space exhausted after {allocated} blocks starting at {base}/{prefix_len}")]
    AddressSpaceExhausted {
        base: Ipv4Addr,
        prefix_len: u8,
        allocated: usize,
    },
    #[error("Routing stack already installed on node {0}")]
    DuplicateStackInstall(u32),
    #[error("Invalid {parameter}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }
}

/// Complete configuration of one experiment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub general: GeneralConfig,
    pub topology: TopologyConfig,
    pub mobility: MobilityConfig,
    pub radio: RadioConfig,
    pub routing: RoutingConfig,
    pub traffic: TrafficConfig,
    pub output: OutputConfig,
}

/// Run-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Simulated time horizon; nothing at or beyond it executes
    #[serde(with = "humantime_serde")]
    pub horizon: Duration,
    /// Seed of the random-number stream
    pub seed: u64,
    /// Throughput sampling period
    #[serde(with = "humantime_serde")]
    pub sample_interval: Duration,
    /// Log filter used when RUST_LOG is not set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Hierarchy and addressing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Layer descriptors, bottom layer first
    pub layers: Vec<LayerDescriptor>,
    /// Network address of the first domain's block
    pub address_base: Ipv4Addr,
    /// Prefix length of every domain block
    pub prefix_len: u8,
}

/// Random waypoint parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MobilityConfig {
    /// Area every cluster node moves in
    pub region: Region,
    /// Upper bound of the uniform speed distribution, in m/s
    pub max_speed: f64,
    #[serde(with = "humantime_serde")]
    pub pause: Duration,
    /// Write a mobility position trace
    pub trace: bool,
    #[serde(with = "humantime_serde")]
    pub trace_interval: Duration,
}

/// Channel and link parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Transmit power in dBm (start and end power are equal)
    pub tx_power_dbm: f64,
    pub standard: String,
    pub phy_mode: String,
    /// One-hop delivery delay of the ideal link model
    #[serde(with = "humantime_serde")]
    pub link_delay: Duration,
    /// Probability that the link model drops a packet
    pub loss_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub protocol: ProtocolSpec,
}

/// Explicit sender/sink pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowAssignment {
    pub sender: u32,
    pub sink: u32,
    /// Defaults to `traffic.port`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Window from which source start times are drawn, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartWindow {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Number of sender/sink pairs
    pub sinks: usize,
    /// Experiment port; flow statistics are filtered on it
    pub port: u16,
    /// Payload size of every packet, in bytes
    pub packet_size: u32,
    /// Constant bit rate of every source, e.g. "2048bps"
    pub data_rate: String,
    pub start_window: StartWindow,
    /// Explicit pairs; derived from the hierarchy when empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<FlowAssignment>,
    /// Packets not received this long after transmission count as lost
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

/// Output file locations, relative to `dir`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub csv: PathBuf,
    pub flow_stats: PathBuf,
    pub mobility_trace: PathBuf,
}

impl OutputConfig {
    pub fn csv_path(&self) -> PathBuf {
        self.dir.join(&self.csv)
    }

    pub fn flow_stats_path(&self) -> PathBuf {
        self.dir.join(&self.flow_stats)
    }

    pub fn mobility_trace_path(&self) -> PathBuf {
        self.dir.join(&self.mobility_trace)
    }
}

impl ExperimentConfig {
    /// Validate scalar parameters.
    ///
    /// Structural checks (layer divisibility, protocol ids, address overlap)
    /// happen in the builders that own them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.horizon.is_zero() {
            return Err(ConfigError::invalid("general.horizon", "horizon must be positive"));
        }
        if self.general.sample_interval.is_zero() {
            return Err(ConfigError::invalid(
                "general.sample_interval",
                "sample interval must be positive",
            ));
        }

        if self.topology.layers.is_empty() {
            return Err(ConfigError::EmptyLayers);
        }
        if !(8..=30).contains(&self.topology.prefix_len) {
            return Err(ConfigError::invalid(
                "topology.prefix_len",
                format!("{} is outside 8..=30", self.topology.prefix_len),
            ));
        }

        self.mobility.region.validate("mobility.region")?;
        if !self.mobility.max_speed.is_finite() || self.mobility.max_speed < 0.0 {
            return Err(ConfigError::invalid(
                "mobility.max_speed",
                format!("{} is not a non-negative speed", self.mobility.max_speed),
            ));
        }
        if self.mobility.trace && self.mobility.trace_interval.is_zero() {
            return Err(ConfigError::invalid(
                "mobility.trace_interval",
                "trace interval must be positive when tracing is enabled",
            ));
        }

        if !self.radio.tx_power_dbm.is_finite() {
            return Err(ConfigError::invalid(
                "radio.tx_power_dbm",
                format!("{} is not a finite power", self.radio.tx_power_dbm),
            ));
        }
        if !(0.0..=1.0).contains(&self.radio.loss_probability) {
            return Err(ConfigError::invalid(
                "radio.loss_probability",
                format!("{} is outside [0, 1]", self.radio.loss_probability),
            ));
        }

        if self.traffic.sinks == 0 {
            return Err(ConfigError::invalid("traffic.sinks", "at least one sink is required"));
        }
        if self.traffic.packet_size == 0 {
            return Err(ConfigError::invalid("traffic.packet_size", "packet size must be positive"));
        }
        let rate_bps = parse_data_rate_bps(&self.traffic.data_rate)
            .map_err(|e| ConfigError::invalid("traffic.data_rate", e))?;
        // Packets must be at least one nanosecond apart
        let bits = u128::from(self.traffic.packet_size) * 8;
        if bits * 1_000_000_000 < u128::from(rate_bps) {
            return Err(ConfigError::invalid(
                "traffic.data_rate",
                format!(
                    "{} sends {}-byte packets less than 1ns apart",
                    self.traffic.data_rate, self.traffic.packet_size
                ),
            ));
        }
        let window = self.traffic.start_window;
        if !(window.min.is_finite() && window.max.is_finite()) || window.min < 0.0 || window.min > window.max {
            return Err(ConfigError::invalid(
                "traffic.start_window",
                format!("[{}, {}] is not a valid window", window.min, window.max),
            ));
        }
        if !self.traffic.assignments.is_empty() && self.traffic.assignments.len() != self.traffic.sinks {
            return Err(ConfigError::invalid(
                "traffic.assignments",
                format!(
                    "{} assignments given for {} sinks",
                    self.traffic.assignments.len(),
                    self.traffic.sinks
                ),
            ));
        }

        Ok(())
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            horizon: Duration::from_secs(200),
            seed: 1,
            sample_interval: Duration::from_secs(1),
            log_level: None,
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            layers: vec![LayerDescriptor::new(6, 6)],
            address_base: Ipv4Addr::new(10, 1, 1, 0),
            prefix_len: 24,
        }
    }
}

impl Default for MobilityConfig {
    fn default() -> Self {
        Self {
            region: Region::new(0.0, 500.0, 0.0, 500.0),
            max_speed: 20.0,
            pause: Duration::ZERO,
            trace: false,
            trace_interval: Duration::from_secs(1),
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            tx_power_dbm: 7.5,
            standard: "802.11b".to_string(),
            phy_mode: "DsssRate11Mbps".to_string(),
            link_delay: Duration::from_millis(1),
            loss_probability: 0.0,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolSpec::Id(1),
        }
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            sinks: 3,
            port: 9,
            packet_size: 64,
            data_rate: "2048bps".to_string(),
            start_window: StartWindow { min: 100.0, max: 101.0 },
            assignments: Vec::new(),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            csv: PathBuf::from("manet-routing.output.csv"),
            flow_stats: PathBuf::from("manet-routing-compare.flowmon.json"),
            mobility_trace: PathBuf::from("manet-routing-compare.mob"),
        }
    }
}
