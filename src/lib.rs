//! # Manetsim - Routing protocol experiments over clustered MANETs
//!
//! This library builds multi-tier clustered ad hoc networks, attaches
//! mobility and routing to them, drives synthetic traffic through a
//! deterministic discrete-event simulation and measures throughput and
//! per-flow statistics.
//!
//! ## Overview
//!
//! Manetsim compares OLSR, AODV, DSDV and DSR on the same hierarchy under
//! the same random waypoint motion. Every random value used during the
//! build is drawn through one seeded stream cursor, so two runs with the
//! same seed produce identical positions, address blocks and start times.
//!
//! ## Key Features
//!
//! - **Cluster Hierarchies**: Any number of layers; each layer's heads form the next layer
//! - **Wireless Domains**: One domain per cluster and per layer relay set, each on its own address block
//! - **Mobility**: Random waypoint inside one configured region, with an optional position trace
//! - **Routing Selection**: Numeric ids or names, with DSR's separate agent path
//! - **Measurements**: Per-second throughput CSV and a JSON flow statistics export
//! - **Sweeps**: Protocol x transmit power grids run in parallel
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `config`: Type-safe configuration structures and the `ConfigError` type
//! - `config_loader`: YAML loading and command-line overrides
//! - `topology`: Cluster hierarchy construction
//! - `ip`: Address block allocation and the address registry
//! - `fabric`: Wireless domain installation
//! - `mobility`: Random stream cursor, random waypoint motion and its assignment
//! - `routing`: Protocol selection and network stack installation
//! - `traffic`: Sender/sink pairing, sources and sinks
//! - `sim`: Event queue, scheduler, periodic tasks, link model and the run loop
//! - `analysis`: Throughput sampling, flow monitoring and flow statistics
//! - `orchestrator`: Building and running one experiment end to end
//! - `sweep`: Parallel parameter sweeps
//! - `utils`: Parsing helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use manetsim::{config_loader, orchestrator};
//! use std::path::Path;
//!
//! let config = config_loader::load_config(Path::new("experiment.yaml"))?;
//! let report = orchestrator::run_experiment(&config)?;
//!
//! println!("{} samples written to {}", report.samples.len(), report.csv_path.display());
//! # Ok::<(), color_eyre::eyre::Report>(())
//! ```
//!
//! ## Configuration Format
//!
//! Every field is optional; missing values reproduce the reference scenario:
//!
//! ```yaml
//! general:
//!   horizon: "200s"
//!   seed: 1
//!
//! topology:
//!   layers:
//!     - clusters: 6
//!       nodes_per_cluster: 6
//!
//! mobility:
//!   region: { x_min: 0.0, x_max: 500.0, y_min: 0.0, y_max: 500.0 }
//!   max_speed: 20.0
//!   trace: false
//!
//! radio:
//!   tx_power_dbm: 7.5
//!
//! routing:
//!   protocol: 1      # 1=OLSR 2=AODV 3=DSDV 4=DSR, or a name
//!
//! traffic:
//!   sinks: 3
//!   data_rate: "2048bps"
//! ```
//!
//! ## Error Handling
//!
//! Configuration problems are reported as `config::ConfigError` before any
//! simulated time passes. Application-level functions return
//! `color_eyre::Result` with context naming the file involved.

pub mod analysis;
pub mod config;
pub mod config_loader;
pub mod fabric;
pub mod ip;
pub mod mobility;
pub mod orchestrator;
pub mod routing;
pub mod sim;
pub mod sweep;
pub mod topology;
pub mod traffic;
pub mod utils;
