//! Periodic throughput sampling.
//!
//! Every tick the sampler takes the byte and packet counters accumulated by
//! the sinks since the previous tick, converts the bytes to kbps, appends a
//! [`ThroughputSample`] to the log and writes it as one CSV row. Taking the
//! counters resets them, so each received byte is counted in exactly one
//! tick.

use std::io::{self, Write};
use std::time::Duration;

use log::debug;
use serde::Serialize;

use crate::traffic::{PacketSink, TickCounters};

/// Header of the throughput CSV
pub const CSV_HEADER: &str =
    "SimulationSecond,ReceiveRate,PacketsReceived,NumberOfSinks,RoutingProtocol,TransmissionPower";

/// One sampling tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputSample {
    /// Simulated time of the tick, in seconds
    pub sim_time: f64,
    pub kbps: f64,
    pub packets_received: u64,
    pub sink_count: usize,
    pub protocol: String,
    pub tx_power_dbm: f64,
}

impl ThroughputSample {
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.sim_time, self.kbps, self.packets_received, self.sink_count, self.protocol, self.tx_power_dbm
        )
    }
}

/// Convert a byte count over one tick to kilobits per second
pub fn bytes_to_kbps(bytes: u64) -> f64 {
    bytes as f64 * 8.0 / 1000.0
}

/// Write the CSV header line
pub fn write_csv_header<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", CSV_HEADER)
}

/// The recurring sampling task
pub struct ThroughputSampler<W: Write> {
    period: Duration,
    protocol: String,
    tx_power_dbm: f64,
    sink_count: usize,
    log: Vec<ThroughputSample>,
    csv: Option<W>,
}

impl<W: Write> ThroughputSampler<W> {
    pub fn new(period: Duration, protocol: &str, tx_power_dbm: f64, sink_count: usize, csv: Option<W>) -> Self {
        Self {
            period,
            protocol: protocol.to_string(),
            tx_power_dbm,
            sink_count,
            log: Vec::new(),
            csv,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sample at `now`: read and reset every sink's tick counters, append
    /// the sample and write its CSV row.
    pub fn tick(&mut self, now: Duration, sinks: &mut [PacketSink]) -> io::Result<&ThroughputSample> {
        let mut total = TickCounters::default();
        for sink in sinks.iter_mut() {
            let counters = sink.take_tick_counters();
            total.bytes += counters.bytes;
            total.packets += counters.packets;
        }

        let sample = ThroughputSample {
            sim_time: now.as_secs_f64(),
            kbps: bytes_to_kbps(total.bytes),
            packets_received: total.packets,
            sink_count: self.sink_count,
            protocol: self.protocol.clone(),
            tx_power_dbm: self.tx_power_dbm,
        };
        if let Some(csv) = self.csv.as_mut() {
            writeln!(csv, "{}", sample.to_csv_row())?;
        }
        if total.packets == 0 {
            debug!("t={}s: no packets received", sample.sim_time);
        }

        self.log.push(sample);
        Ok(&self.log[self.log.len() - 1])
    }

    /// Samples appended so far, in tick order
    pub fn samples(&self) -> &[ThroughputSample] {
        &self.log
    }

    /// Flush and return the CSV writer along with the log
    pub fn finish(mut self) -> io::Result<(Vec<ThroughputSample>, Option<W>)> {
        if let Some(csv) = self.csv.as_mut() {
            csv.flush()?;
        }
        Ok((self.log, self.csv))
    }
}
