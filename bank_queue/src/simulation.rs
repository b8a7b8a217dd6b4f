//! Simulation driver
//!
//! Owns everything one run needs (event loop, random streams, teller pool,
//! collector) and turns the agents' final stats into a [`RunReport`].

use des::{EventLoop, RunOutcome, StopSignal};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{CompletionPolicy, ValidConfig};
use crate::customer::{CustomerProcess, CustomerStats};
use crate::error::SimError;
use crate::statistics::{CustomerRecord, DerivedMetrics, RunStatistics, StatisticsCollector};
use crate::teller_pool::{TellerPool, TellerPoolStats};
use crate::trace::{TraceEntry, TraceRecorder};
use crate::{BankAgent, Event, Stats};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Termination {
    /// Clock stopped at the horizon (truncating policy).
    Horizon,
    /// Arrivals stopped at the horizon and everyone inside was served.
    Drained,
    /// Terminated early by the caller at `at` minutes.
    Stopped { at: f64 },
}

/// Everything a run hands to reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub metrics: DerivedMetrics,
    pub arrivals: usize,
    /// Customers still queued or in service when the run ended; they are
    /// excluded from every metric.
    pub in_flight: usize,
    pub max_queue_length: usize,
    pub termination: Termination,
    /// Length of simulated time the time averages are taken over.
    pub window_minutes: f64,
    pub seed: u64,
    pub customers: Vec<CustomerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceEntry>>,
}

impl RunReport {
    pub fn served_count(&self) -> usize {
        self.metrics.served_count
    }

    /// False when customers were left in the bank and so excluded.
    pub fn is_complete(&self) -> bool {
        self.in_flight == 0
    }
}

/// Resolve the seed a run will use: the configured one, or a fresh draw.
pub fn resolve_seed(config: &ValidConfig) -> u64 {
    config
        .random_seed
        .unwrap_or_else(|| rand::rng().random::<u64>())
}

/// Fresh event loop for one run, with the first arrival already scheduled.
pub fn build_event_loop(config: &ValidConfig, seed: u64) -> EventLoop<Event, Stats> {
    let mut customers = CustomerProcess::for_config(config, seed);
    let initial_events: Vec<(f64, Event)> = customers.first_arrival().into_iter().collect();

    let mut agents: Vec<BankAgent> = vec![
        Box::new(customers),
        Box::new(TellerPool::with_capacity(config.teller_count)),
        Box::new(StatisticsCollector::new(config.teller_count)),
    ];
    if config.record_trace {
        agents.push(Box::new(TraceRecorder::new()));
    }

    EventLoop::new(initial_events, agents)
}

/// How a run that was not cut short ends under the configured policy.
pub(crate) fn natural_termination(config: &ValidConfig) -> Termination {
    match config.completion {
        CompletionPolicy::Truncate => Termination::Horizon,
        CompletionPolicy::Drain => Termination::Drained,
    }
}

/// Natural end time for the event loop under the configured policy.
pub fn run_limit(config: &ValidConfig) -> f64 {
    match config.completion {
        CompletionPolicy::Truncate => config.horizon_minutes,
        CompletionPolicy::Drain => f64::INFINITY,
    }
}

/// Assemble a report from the stats of the agents built by
/// [`build_event_loop`].
pub fn report_from_stats(
    config: &ValidConfig,
    seed: u64,
    stats: Vec<Stats>,
    termination: Termination,
) -> RunReport {
    let mut collector: Option<RunStatistics> = None;
    let mut customers = CustomerStats::default();
    let mut tellers = TellerPoolStats::default();
    let mut trace = None;
    for s in stats {
        match s {
            Stats::Collector(run) => collector = Some(run),
            Stats::Customers(c) => customers = c,
            Stats::Tellers(t) => tellers = t,
            Stats::Trace(entries) => trace = Some(entries),
        }
    }
    let collector = collector.unwrap_or_else(|| RunStatistics::new(config.teller_count));

    let window_minutes = match termination {
        Termination::Horizon => config.horizon_minutes,
        Termination::Drained => config.horizon_minutes.max(collector.last_event_t),
        Termination::Stopped { at } => at,
    };
    let metrics = collector.finalize(window_minutes);

    RunReport {
        arrivals: customers.arrivals,
        in_flight: collector.in_flight(),
        max_queue_length: tellers.peak_queue_length,
        termination,
        window_minutes,
        seed,
        customers: collector.customers,
        trace,
        metrics,
    }
}

/// A single run: build with [`Simulation::new`], then [`Simulation::run`]
/// or [`Simulation::run_until`].
pub struct Simulation {
    config: ValidConfig,
    seed: u64,
    event_loop: EventLoop<Event, Stats>,
    stop: StopSignal,
}

impl Simulation {
    pub fn new(config: ValidConfig) -> Simulation {
        let seed = resolve_seed(&config);
        let stop = StopSignal::new();
        let event_loop = build_event_loop(&config, seed).with_stop_signal(stop.clone());
        Simulation {
            config,
            seed,
            event_loop,
            stop,
        }
    }

    /// Validate `config` and build the run.
    pub fn from_config(config: crate::SimConfig) -> Result<Simulation, SimError> {
        Ok(Simulation::new(config.validate()?))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &ValidConfig {
        &self.config
    }

    /// Handle another thread (or an agent) can use to end the run early.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run to the horizon, or until the bank empties when draining.
    pub fn run(self) -> Result<RunReport, SimError> {
        let limit = run_limit(&self.config);
        self.run_to(limit, false)
    }

    /// Terminate early at `stop_at` minutes. Statistics cover customers
    /// served by then; everyone else is counted in `in_flight`.
    pub fn run_until(self, stop_at: f64) -> Result<RunReport, SimError> {
        if !(stop_at >= 0.0) {
            return Err(SimError::invalid(
                "stop_at",
                format!("must be a non-negative number of minutes (got {})", stop_at),
            ));
        }
        let limit = run_limit(&self.config);
        if stop_at >= limit {
            return self.run();
        }
        self.run_to(stop_at, true)
    }

    fn run_to(mut self, limit: f64, early: bool) -> Result<RunReport, SimError> {
        info!(
            seed = self.seed,
            tellers = self.config.teller_count,
            mean_interarrival = self.config.mean_interarrival_minutes,
            mean_service = self.config.mean_service_minutes,
            horizon = self.config.horizon_minutes,
            "starting run"
        );

        let outcome = self.event_loop.run(limit)?;
        let termination = match outcome {
            RunOutcome::Stopped => Termination::Stopped {
                at: self.event_loop.current_t(),
            },
            // events were still pending at the stop time
            RunOutcome::ReachedHorizon if early => Termination::Stopped { at: limit },
            // reached the horizon, or the bank emptied before any stop time
            RunOutcome::ReachedHorizon | RunOutcome::Exhausted => {
                natural_termination(&self.config)
            }
        };

        let report = report_from_stats(
            &self.config,
            self.seed,
            self.event_loop.stats(),
            termination,
        );
        if report.in_flight > 0 {
            warn!(
                in_flight = report.in_flight,
                "run ended with customers still in the bank; they are excluded"
            );
        }
        info!(
            served = report.served_count(),
            arrivals = report.arrivals,
            events = self.event_loop.dispatched(),
            ?termination,
            "run finished"
        );
        Ok(report)
    }
}
