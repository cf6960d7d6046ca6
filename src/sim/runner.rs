//! Event-driven experiment run.
//!
//! Drives the throughput sampler, the optional mobility trace and every
//! traffic source through one [`Scheduler`]. Nothing scheduled at or after
//! the horizon executes; at the horizon the periodic tasks are cancelled,
//! the remaining events are discarded, the sources are stopped and
//! undelivered packets are reconciled as lost.

use std::collections::HashMap;
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::time::Duration;

use log::{debug, info, trace};

use crate::analysis::{FlowId, FlowMonitor, ThroughputSample, ThroughputSampler};
use crate::mobility::{MobilitySet, MobilityTraceWriter};
use crate::traffic::TrafficPlan;

use super::link::{Delivery, LinkModel};
use super::periodic::PeriodicTask;
use super::scheduler::Scheduler;

/// Everything the scheduler can fire
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    ThroughputTick,
    MobilityTrace,
    SourceStart(usize),
    SourceSend(usize),
    SourceStop(usize),
    PacketArrival {
        sink: usize,
        flow: FlowId,
        sequence: u64,
        bytes: u32,
    },
}

/// Timing of one run
#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub horizon: Duration,
    pub sample_interval: Duration,
    /// Packets still undelivered this long before the horizon are lost
    pub max_delay: Duration,
}

/// Counters of one run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub events_executed: u64,
    pub events_discarded: usize,
    pub packets_sent: u64,
    pub packets_dropped: u64,
    pub packets_lost: u64,
}

/// Results handed back after the horizon
pub struct RunOutcome<W: Write, T: Write> {
    pub samples: Vec<ThroughputSample>,
    pub monitor: FlowMonitor,
    pub plan: TrafficPlan,
    pub mobility: MobilitySet,
    pub csv: Option<W>,
    pub trace: Option<T>,
    pub stats: RunStats,
}

struct TraceTask<T: Write> {
    writer: MobilityTraceWriter<T>,
    task: PeriodicTask,
}

/// One single-threaded simulation
pub struct Simulation<W: Write, T: Write> {
    scheduler: Scheduler<SimEvent>,
    settings: RunSettings,
    plan: TrafficPlan,
    mobility: MobilitySet,
    link: Box<dyn LinkModel + Send>,
    monitor: FlowMonitor,
    sampler: ThroughputSampler<W>,
    sampler_task: PeriodicTask,
    trace: Option<TraceTask<T>>,
    /// (address, port) -> sink index
    sink_index: HashMap<(Ipv4Addr, u16), usize>,
    stats: RunStats,
}

impl<W: Write, T: Write> Simulation<W, T> {
    pub fn new(
        settings: RunSettings,
        plan: TrafficPlan,
        mobility: MobilitySet,
        link: Box<dyn LinkModel + Send>,
        sampler: ThroughputSampler<W>,
    ) -> Self {
        let sink_index = plan
            .sinks
            .iter()
            .enumerate()
            .map(|(i, sink)| ((sink.address, sink.port), i))
            .collect();
        let sampler_task = PeriodicTask::new(settings.sample_interval);
        Self {
            scheduler: Scheduler::new(),
            settings,
            plan,
            mobility,
            link,
            monitor: FlowMonitor::new(),
            sampler,
            sampler_task,
            trace: None,
            sink_index,
            stats: RunStats::default(),
        }
    }

    /// Sample every node's position each `interval`, starting at time 0
    pub fn with_mobility_trace(mut self, writer: MobilityTraceWriter<T>, interval: Duration) -> Self {
        self.trace = Some(TraceTask {
            writer,
            task: PeriodicTask::new(interval),
        });
        self
    }

    fn schedule_initial_events(&mut self) {
        // The sampler is queued before anything else so it fires first at t=0
        self.sampler_task
            .start(&mut self.scheduler, Duration::ZERO, SimEvent::ThroughputTick);
        if let Some(trace) = self.trace.as_mut() {
            trace.task.start(&mut self.scheduler, Duration::ZERO, SimEvent::MobilityTrace);
        }
        for (index, source) in self.plan.sources.iter().enumerate() {
            self.scheduler.schedule_at(source.start, SimEvent::SourceStart(index));
            self.scheduler.schedule_at(source.stop, SimEvent::SourceStop(index));
        }
    }

    /// Run until the horizon
    pub fn run(mut self) -> io::Result<RunOutcome<W, T>> {
        let horizon = self.settings.horizon;
        info!(
            "Running {} flows until t={}s",
            self.plan.sources.len(),
            horizon.as_secs_f64()
        );
        self.schedule_initial_events();

        while let Some((now, event)) = self.scheduler.pop_before(horizon) {
            self.handle(now, event)?;
        }

        self.teardown();

        let (samples, csv) = self.sampler.finish()?;
        let trace = match self.trace {
            Some(mut trace) => {
                trace.writer.flush()?;
                Some(trace.writer.into_inner())
            }
            None => None,
        };
        info!(
            "Run finished: {} events, {} packets sent, {} lost",
            self.stats.events_executed, self.stats.packets_sent, self.stats.packets_lost
        );
        Ok(RunOutcome {
            samples,
            monitor: self.monitor,
            plan: self.plan,
            mobility: self.mobility,
            csv,
            trace,
            stats: self.stats,
        })
    }

    fn handle(&mut self, now: Duration, event: SimEvent) -> io::Result<()> {
        self.stats.events_executed += 1;
        match event {
            SimEvent::ThroughputTick => {
                self.sampler.tick(now, &mut self.plan.sinks)?;
                self.sampler_task
                    .reschedule(&mut self.scheduler, SimEvent::ThroughputTick);
            }
            SimEvent::MobilityTrace => {
                if let Some(trace) = self.trace.as_mut() {
                    trace.writer.sample(now, &mut self.mobility)?;
                    trace.task.reschedule(&mut self.scheduler, SimEvent::MobilityTrace);
                }
            }
            SimEvent::SourceStart(index) => {
                if let Some(first) = self.plan.sources.get_mut(index).and_then(|s| s.start(now)) {
                    debug!("Source {} started at {:.3}s", index, now.as_secs_f64());
                    self.scheduler.schedule_at(first, SimEvent::SourceSend(index));
                }
            }
            SimEvent::SourceSend(index) => self.send(now, index),
            SimEvent::SourceStop(index) => {
                if let Some(source) = self.plan.sources.get_mut(index) {
                    source.stop();
                }
            }
            SimEvent::PacketArrival {
                sink,
                flow,
                sequence,
                bytes,
            } => {
                if let Some(sink) = self.plan.sinks.get_mut(sink) {
                    sink.receive(bytes);
                }
                self.monitor.on_receive(now, flow, sequence, bytes);
            }
        }
        Ok(())
    }

    fn send(&mut self, now: Duration, index: usize) {
        let Some(source) = self.plan.sources.get_mut(index) else {
            return;
        };
        let Some(next) = source.on_send(now) else {
            return;
        };
        let bytes = source.packet_size;
        let tuple = self.plan.flows[index].five_tuple;
        let (flow, sequence) = self.monitor.on_transmit(now, tuple, bytes);
        self.stats.packets_sent += 1;

        match self.link.transmit(tuple.source_address, tuple.destination_address, bytes) {
            Delivery::Delivered(delay) => match self.sink_index.get(&(tuple.destination_address, tuple.destination_port)) {
                Some(&sink) => {
                    self.scheduler.schedule_at(
                        now + delay,
                        SimEvent::PacketArrival {
                            sink,
                            flow,
                            sequence,
                            bytes,
                        },
                    );
                }
                None => {
                    self.stats.packets_dropped += 1;
                    debug!("No sink bound at {}:{}", tuple.destination_address, tuple.destination_port);
                }
            },
            Delivery::Lost => {
                self.stats.packets_dropped += 1;
                trace!("Packet {} of flow {} lost on the link", sequence, flow);
            }
        }
        self.scheduler.schedule_at(next, SimEvent::SourceSend(index));
    }

    fn teardown(&mut self) {
        let horizon = self.settings.horizon;
        self.sampler_task.cancel(&mut self.scheduler);
        if let Some(trace) = self.trace.as_mut() {
            trace.task.cancel(&mut self.scheduler);
        }
        self.stats.events_discarded = self.scheduler.drain(horizon);
        for source in &mut self.plan.sources {
            source.stop();
        }
        self.stats.packets_lost = self.monitor.check_for_lost_packets(horizon, self.settings.max_delay);
        debug!(
            "Teardown at {}s: {} pending events discarded",
            horizon.as_secs_f64(),
            self.stats.events_discarded
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FlowTable;
    use crate::sim::IdealLink;
    use crate::topology::NodeId;
    use crate::traffic::{FiveTuple, Flow, OnOffSource, PacketSink, UDP_PROTOCOL};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const SRC: Ipv4Addr = Ipv4Addr::new(10, 1, 6, 6);
    const DST: Ipv4Addr = Ipv4Addr::new(10, 1, 7, 1);

    fn plan(start: Duration, horizon: Duration) -> TrafficPlan {
        let five_tuple = FiveTuple {
            source_address: SRC,
            destination_address: DST,
            source_port: 49153,
            destination_port: 9,
            protocol: UDP_PROTOCOL,
        };
        TrafficPlan {
            flows: vec![Flow {
                id: 1,
                source: NodeId(35),
                destination: NodeId(0),
                port: 9,
                five_tuple,
                start,
                stop: horizon,
            }],
            sinks: vec![PacketSink::new(NodeId(0), DST, 9)],
            sources: vec![OnOffSource::new(NodeId(35), SRC, 49153, DST, 9, 64, 2048, start, horizon)],
        }
    }

    fn simulation(
        start: Duration,
        horizon: Duration,
        loss: f64,
    ) -> Simulation<Vec<u8>, Vec<u8>> {
        let settings = RunSettings {
            horizon,
            sample_interval: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };
        let link = IdealLink::new(Duration::from_millis(1), loss, ChaCha8Rng::seed_from_u64(1));
        let sampler = ThroughputSampler::new(Duration::from_secs(1), "OLSR", 7.5, 1, Some(Vec::new()));
        Simulation::new(settings, plan(start, horizon), MobilitySet::new(), Box::new(link), sampler)
    }

    #[test]
    fn test_one_sample_per_second() {
        let outcome = simulation(Duration::from_secs(5), Duration::from_secs(20), 0.0).run().unwrap();
        assert_eq!(outcome.samples.len(), 20);
        assert_eq!(outcome.samples[0].sim_time, 0.0);
        assert_eq!(outcome.samples[19].sim_time, 19.0);

        let csv = String::from_utf8(outcome.csv.unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 20);
    }

    #[test]
    fn test_steady_state_rate() {
        let outcome = simulation(Duration::from_secs(5), Duration::from_secs(20), 0.0).run().unwrap();
        // Nothing before the source starts
        assert!(outcome.samples[..6].iter().all(|s| s.packets_received == 0));
        // 4 packets of 64 bytes per second once running
        let steady = &outcome.samples[10];
        assert_eq!(steady.packets_received, 4);
        assert_eq!(steady.kbps, 256.0 * 8.0 / 1000.0);
    }

    #[test]
    fn test_flow_counters_after_run() {
        let outcome = simulation(Duration::from_secs(5), Duration::from_secs(20), 0.0).run().unwrap();
        let ids = outcome.monitor.flow_ids();
        assert_eq!(ids.len(), 1);
        let stats = outcome.monitor.stats(ids[0]).unwrap();
        assert_eq!(stats.first_tx, Some(Duration::from_millis(5250)));
        assert_eq!(stats.tx_packets, stats.rx_packets);
        assert_eq!(stats.lost_packets, 0);
        assert_eq!(outcome.plan.sinks[0].total_packets(), stats.rx_packets);
    }

    #[test]
    fn test_source_starting_after_horizon_never_sends() {
        let outcome = simulation(Duration::from_secs(30), Duration::from_secs(20), 0.0).run().unwrap();
        assert_eq!(outcome.stats.packets_sent, 0);
        assert!(outcome.monitor.flow_ids().is_empty());
        assert_eq!(outcome.samples.len(), 20);
    }

    #[test]
    fn test_link_loss_is_recorded_as_lost() {
        let outcome = simulation(Duration::from_secs(1), Duration::from_secs(30), 1.0).run().unwrap();
        let ids = outcome.monitor.flow_ids();
        let stats = outcome.monitor.stats(ids[0]).unwrap();
        assert_eq!(stats.rx_packets, 0);
        // Packets sent in the last 10 s are not yet counted as lost
        assert!(stats.lost_packets > 0 && stats.lost_packets < stats.tx_packets);
        assert!(outcome.samples.iter().all(|s| s.kbps == 0.0));
    }
}
