//! Mobility position trace.
//!
//! One line per node per sample:
//! `now=+5.000000000s node=3 pos=120.50:88.10:0.00 vel=-3.20:1.05:0.00`

use std::io::{self, Write};
use std::time::Duration;

use crate::topology::NodeId;

use super::assigner::MobilitySet;
use super::waypoint::Vector;

/// Writes position and velocity samples to any sink
pub struct MobilityTraceWriter<W: Write> {
    out: W,
    samples: usize,
}

impl<W: Write> MobilityTraceWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, samples: 0 }
    }

    /// Write one line per node at `now`
    pub fn sample(&mut self, now: Duration, mobility: &mut MobilitySet) -> io::Result<()> {
        for (node, process) in mobility.iter_mut() {
            let position = process.position(now);
            let velocity = process.velocity(now);
            self.write_line(now, *node, position, velocity)?;
        }
        self.samples += 1;
        Ok(())
    }

    fn write_line(&mut self, now: Duration, node: NodeId, pos: Vector, vel: Vector) -> io::Result<()> {
        writeln!(
            self.out,
            "now=+{:.9}s node={} pos={:.2}:{:.2}:0.00 vel={:.2}:{:.2}:0.00",
            now.as_secs_f64(),
            node,
            pos.x,
            pos.y,
            vel.x,
            vel.y
        )
    }

    /// Number of samples written so far
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
