//! Discrete-event simulation kernel.
//!
//! A deterministic, single-threaded event loop: one ordered queue keyed by
//! (time, sequence), cancellable event ids, periodic task handles and a
//! pluggable link model.

pub mod event_queue;
pub mod link;
pub mod periodic;
pub mod runner;
pub mod scheduler;

pub use event_queue::{EventId, EventKey};
pub use link::{Delivery, IdealLink, LinkModel};
pub use periodic::PeriodicTask;
pub use runner::{RunOutcome, RunSettings, RunStats, SimEvent, Simulation};
pub use scheduler::Scheduler;
