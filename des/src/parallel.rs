//! Parallel execution of independent EventLoop scenarios
//!
//! Each scenario gets a fresh [`EventLoop`] from the builder, runs on the
//! rayon pool, and hands back the stats of all its agents. Results come back
//! in scenario_id order regardless of which thread finished first.
//!
//! # Determinism
//!
//! Results are deterministic when:
//! 1. Builder function uses `scenario_id` to derive unique seeds
//! 2. Agents use seeded RNGs (e.g., `StdRng::seed_from_u64(seed)`)
//! 3. No shared mutable state across scenarios
//!
//! # Error Handling
//!
//! A panic inside one scenario, or a scheduling error returned by its event
//! loop, is reported as that scenario's `Err`. Other scenarios continue.
//!
//! ```rust
//! use des::parallel::ParallelRunner;
//! # use des::{Agent, EventLoop};
//! # struct TestAgent;
//! # impl Agent<u8, usize> for TestAgent {
//! #     fn stats(&self) -> usize { 1 }
//! # }
//!
//! let results = ParallelRunner::new(8, |_scenario_id| {
//!     let agents: Vec<Box<dyn Agent<u8, usize>>> = vec![Box::new(TestAgent)];
//!     EventLoop::new(vec![(0.0, 1)], agents)
//! })
//! .num_threads(2)
//! .run(100.0);
//!
//! assert_eq!(results.len(), 8);
//! assert!(results.iter().all(|r| r.is_ok()));
//! ```

use crate::{DesError, EventLoop};
use rayon::prelude::*;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    #[error("scenario panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Des(#[from] DesError),

    #[error("could not build thread pool: {0}")]
    ThreadPool(String),
}

/// Executes multiple EventLoop scenarios in parallel
///
/// The builder must be `Fn(usize) -> EventLoop<T, S> + Send + Sync`: it is
/// called once per scenario_id, possibly from several threads at once.
pub struct ParallelRunner<T, S, F>
where
    F: Fn(usize) -> EventLoop<T, S> + Send + Sync,
    S: Send,
{
    num_scenarios: usize,
    builder: F,
    num_threads: Option<usize>,
    progress_callback: Option<Arc<dyn Fn(usize, usize) + Send + Sync>>,
    _scenario: PhantomData<fn() -> (T, S)>,
}

impl<T, S, F> ParallelRunner<T, S, F>
where
    F: Fn(usize) -> EventLoop<T, S> + Send + Sync,
    S: Send,
{
    pub fn new(num_scenarios: usize, builder: F) -> Self {
        ParallelRunner {
            num_scenarios,
            builder,
            num_threads: None,
            progress_callback: None,
            _scenario: PhantomData,
        }
    }

    /// Set number of threads (defaults to rayon's global pool)
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Set progress callback, called with `(completed, total)` after each
    /// scenario finishes.
    pub fn progress<P>(mut self, callback: P) -> Self
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Execute all scenarios up to `run_until` and return results in order.
    pub fn run(self, run_until: f64) -> Vec<Result<Vec<S>, ScenarioError>> {
        let progress_counter = AtomicUsize::new(0);

        let execute = || {
            (0..self.num_scenarios)
                .into_par_iter()
                .map(|scenario_id| {
                    let scenario = || -> Result<Vec<S>, ScenarioError> {
                        let mut event_loop = (self.builder)(scenario_id);
                        event_loop.run(run_until)?;
                        Ok(event_loop.stats())
                    };
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(scenario));

                    let completed = progress_counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(completed, self.num_scenarios);
                    }

                    let result = result.unwrap_or_else(|panic| {
                        let message = if let Some(s) = panic.downcast_ref::<&str>() {
                            s.to_string()
                        } else if let Some(s) = panic.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            "Unknown panic".to_string()
                        };
                        Err(ScenarioError::Panicked(message))
                    });
                    if let Err(e) = &result {
                        warn!(scenario_id, error = %e, "scenario failed");
                    }
                    result
                })
                .collect()
        };

        match self.num_threads {
            None => execute(),
            Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => pool.install(execute),
                Err(e) => (0..self.num_scenarios)
                    .map(|_| Err(ScenarioError::ThreadPool(e.to_string())))
                    .collect(),
            },
        }
    }
}

/// Run scenarios in parallel with the default pool and no progress reporting.
pub fn run_parallel<T, S, F>(
    num_scenarios: usize,
    builder: F,
    run_until: f64,
) -> Vec<Result<Vec<S>, ScenarioError>>
where
    F: Fn(usize) -> EventLoop<T, S> + Send + Sync,
    S: Send,
{
    ParallelRunner::new(num_scenarios, builder).run(run_until)
}

/// Progress callback that logs every `interval` completed scenarios.
pub fn simple_progress_reporter(interval: usize) -> impl Fn(usize, usize) + Send + Sync {
    let interval = interval.max(1);
    move |completed, total| {
        if completed % interval == 0 || completed == total {
            tracing::info!("completed {}/{} scenarios", completed, total);
        }
    }
}
