//! Bank teller queue as a discrete event simulation.
//!
//! One shared FIFO queue feeds `teller_count` identical tellers. Customers
//! arrive with exponential interarrival times, are served for an exponential
//! duration and leave. Agents:
//! - [`CustomerProcess`]: arrival chain and service durations
//! - [`TellerPool`]: grants tellers and holds the wait queue
//! - [`StatisticsCollector`]: per-customer records and run totals
//! - [`TraceRecorder`]: optional copy of every dispatched event
//!
//! [`Simulation`] wires them onto a [`des::EventLoop`] for one run;
//! [`replications`] runs several seeded copies in parallel.

pub mod config;
pub mod customer;
pub mod error;
pub mod generators;
pub mod replications;
pub mod simulation;
pub mod statistics;
pub mod teller_pool;
pub mod trace;

pub use config::{CompletionPolicy, ExperimentConfig, SimConfig, ValidConfig};
pub use customer::{CustomerProcess, CustomerStats, Phase};
pub use error::SimError;
pub use generators::RandomStreams;
pub use replications::{ReplicationSummary, run_replications};
pub use simulation::{RunReport, Simulation, Termination};
pub use statistics::{CustomerRecord, DerivedMetrics, RunStatistics, StatisticsCollector};
pub use teller_pool::{TellerPool, TellerPoolStats};
pub use trace::{TraceEntry, TraceRecorder};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Arrival { customer_id: usize },
    ServiceStart { customer_id: usize, teller_id: usize },
    ServiceEnd { customer_id: usize, teller_id: usize },
}

/// Stats snapshot of any agent in the bank.
#[derive(Debug, Clone)]
pub enum Stats {
    Customers(CustomerStats),
    Tellers(TellerPoolStats),
    Collector(RunStatistics),
    Trace(Vec<TraceEntry>),
}

pub type BankAgent = Box<dyn des::Agent<Event, Stats>>;
