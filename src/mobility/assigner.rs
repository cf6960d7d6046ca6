//! Mobility assignment over wireless domains.
//!
//! Every node of a domain gets a [`RandomWaypoint`] process whose initial
//! position and speed are drawn from the shared build stream (x, y, speed:
//! three draws per node). A node that already moves with an earlier domain
//! keeps its process and draws nothing.

use std::collections::BTreeMap;
use std::time::Duration;

use log::{debug, info};

use crate::config::MobilityConfig;
use crate::fabric::{DomainKind, Fabric};
use crate::topology::NodeId;

use super::stream::{substream, UniformStream};
use super::waypoint::{RandomWaypoint, Region, Vector};

/// Draws consumed per newly assigned node
pub const DRAWS_PER_NODE: u64 = 3;

/// Motion parameters for one domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobilityParams {
    pub region: Region,
    pub max_speed: f64,
    pub pause: Duration,
}

/// Mobility processes of every moving node
#[derive(Debug, Clone, Default)]
pub struct MobilitySet {
    processes: BTreeMap<NodeId, RandomWaypoint>,
}

impl MobilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.processes.contains_key(&node)
    }

    pub fn get(&self, node: NodeId) -> Option<&RandomWaypoint> {
        self.processes.get(&node)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Initial positions in node order
    pub fn initial_positions(&self) -> Vec<(NodeId, Vector)> {
        self.processes
            .iter()
            .map(|(node, p)| (*node, p.initial_position()))
            .collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&NodeId, &mut RandomWaypoint)> {
        self.processes.iter_mut()
    }
}

/// Attaches random waypoint processes to node sets
#[derive(Debug, Clone, Copy)]
pub struct MobilityAssigner {
    seed: u64,
}

impl MobilityAssigner {
    /// `seed` feeds the per-node private substreams
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Attach a process to every not-yet-moving node of `nodes`.
    ///
    /// # Returns
    /// The number of values drawn from `stream`, which is exactly the
    /// amount its cursor advanced.
    pub fn assign(
        &self,
        set: &mut MobilitySet,
        stream: &mut UniformStream,
        nodes: &[NodeId],
        params: &MobilityParams,
    ) -> u64 {
        let before = stream.cursor();
        for node in nodes {
            if set.contains(*node) {
                continue;
            }
            let x = stream.draw(params.region.x_min, params.region.x_max);
            let y = stream.draw(params.region.y_min, params.region.y_max);
            let speed = stream.draw(0.0, params.max_speed);
            debug!("Node {} starts at ({:.2}, {:.2}) moving at {:.2} m/s", node, x, y, speed);

            let process = RandomWaypoint::new(
                params.region,
                params.max_speed,
                params.pause,
                Vector::new(x, y),
                speed,
                substream(self.seed, u64::from(node.0)),
            );
            set.processes.insert(*node, process);
        }
        let advance = stream.cursor().since(before);
        debug_assert_eq!(advance % DRAWS_PER_NODE, 0);
        advance
    }

    /// Assign mobility to every cluster domain in creation order.
    ///
    /// Cluster heads already move with their layer-0 cluster, so only the
    /// bottom layer draws from the stream.
    pub fn assign_fabric(&self, fabric: &Fabric, config: &MobilityConfig, stream: &mut UniformStream) -> MobilitySet {
        let mut set = MobilitySet::new();
        for domain in &fabric.domains {
            if let DomainKind::Cluster { .. } = domain.kind {
                let params = MobilityParams {
                    region: config.region,
                    max_speed: config.max_speed,
                    pause: config.pause,
                };
                let advance = self.assign(&mut set, stream, &domain.nodes, &params);
                debug!("Domain {} mobility advanced cursor by {} to {}", domain.id, advance, stream.cursor());
            }
        }
        info!("Assigned mobility to {} nodes (cursor at {})", set.len(), stream.cursor());
        set
    }
}
