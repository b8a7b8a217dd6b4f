//! Independent replications of one configuration
//!
//! Replication `i` runs with seed `base_seed + i` on its own event loop, so
//! the batch is reproducible from the base seed regardless of thread count.
//! [`ReplicationSummary`] aggregates the per-run reports the way a bank
//! study would quote them: across-run mean and spread of the average wait,
//! plus figures pooled over every served customer.

use des::parallel::{ParallelRunner, simple_progress_reporter};
use serde::Serialize;
use tracing::info;

use crate::config::ValidConfig;
use crate::error::SimError;
use crate::simulation::{
    RunReport, build_event_loop, natural_termination, report_from_stats, resolve_seed, run_limit,
};

/// z value for a two-sided 95% normal interval.
const Z_95: f64 = 1.96;

/// Run `replications` copies of `config`, at most `threads` at a time.
///
/// Reports come back in replication order. The first failed replication
/// fails the batch.
pub fn run_replications(
    config: &ValidConfig,
    replications: usize,
    threads: Option<usize>,
) -> Result<Vec<RunReport>, SimError> {
    let base_seed = resolve_seed(config);
    info!(replications, base_seed, "starting replications");

    let mut runner = ParallelRunner::new(replications, |index| {
        build_event_loop(config, base_seed.wrapping_add(index as u64))
    })
    .progress(simple_progress_reporter(10));
    if let Some(n) = threads {
        runner = runner.num_threads(n);
    }
    let results = runner.run(run_limit(config));

    let termination = natural_termination(config);
    results
        .into_iter()
        .enumerate()
        .map(|(index, result)| -> Result<RunReport, SimError> {
            let stats = result.map_err(|source| SimError::Replication { index, source })?;
            let seed = base_seed.wrapping_add(index as u64);
            Ok(report_from_stats(config, seed, stats, termination))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicationSummary {
    pub total_runs: usize,
    pub total_served: usize,
    pub mean_served_per_run: f64,
    /// Runs that served at least one customer; only they enter the
    /// across-run wait figures.
    pub runs_with_service: usize,
    pub mean_average_wait: Option<f64>,
    /// Sample standard deviation of per-run average waits (needs two runs).
    pub std_average_wait: Option<f64>,
    pub wait_ci95: Option<(f64, f64)>,
    pub mean_max_wait: Option<f64>,
    pub mean_average_service: Option<f64>,
    pub overall_average_wait: Option<f64>,
    pub overall_max_wait: Option<f64>,
    pub overall_average_service: Option<f64>,
    pub total_in_flight: usize,
}

impl ReplicationSummary {
    pub fn from_reports(reports: &[RunReport]) -> ReplicationSummary {
        let total_runs = reports.len();
        let total_served: usize = reports.iter().map(RunReport::served_count).sum();

        let served_runs: Vec<&RunReport> =
            reports.iter().filter(|r| r.served_count() > 0).collect();
        let average_waits: Vec<f64> = served_runs
            .iter()
            .filter_map(|r| r.metrics.average_wait_minutes)
            .collect();
        let max_waits: Vec<f64> = served_runs
            .iter()
            .filter_map(|r| r.metrics.max_wait_minutes)
            .collect();
        let average_services: Vec<f64> = served_runs
            .iter()
            .filter_map(|r| r.metrics.average_service_minutes)
            .collect();

        let mean_average_wait = mean(&average_waits);
        let std_average_wait = sample_std(&average_waits);
        let wait_ci95 = mean_average_wait.zip(std_average_wait).map(|(m, sd)| {
            let half_width = Z_95 * sd / (average_waits.len() as f64).sqrt();
            (m - half_width, m + half_width)
        });

        let served: Vec<_> = reports
            .iter()
            .flat_map(|r| r.customers.iter())
            .filter(|c| c.is_served())
            .collect();
        let all_waits: Vec<f64> = served.iter().filter_map(|c| c.wait_time()).collect();
        let all_services: Vec<f64> = served.iter().filter_map(|c| c.service_time()).collect();

        ReplicationSummary {
            total_runs,
            total_served,
            mean_served_per_run: if total_runs > 0 {
                total_served as f64 / total_runs as f64
            } else {
                0.0
            },
            runs_with_service: served_runs.len(),
            mean_average_wait,
            std_average_wait,
            wait_ci95,
            mean_max_wait: mean(&max_waits),
            mean_average_service: mean(&average_services),
            overall_average_wait: mean(&all_waits),
            overall_max_wait: all_waits.iter().copied().reduce(f64::max),
            overall_average_service: mean(&all_services),
            total_in_flight: reports.iter().map(|r| r.in_flight).sum(),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimConfig;
    use crate::simulation::Termination;
    use crate::statistics::{CustomerRecord, DerivedMetrics};
    use approx::assert_relative_eq;

    fn report(waits: &[f64]) -> RunReport {
        let customers: Vec<CustomerRecord> = waits
            .iter()
            .enumerate()
            .map(|(i, w)| CustomerRecord {
                customer_id: i,
                arrival_time: 0.0,
                service_start_time: Some(*w),
                departure_time: Some(*w + 1.0),
                teller_id: Some(0),
            })
            .collect();
        let served = waits.len();
        let metrics = DerivedMetrics {
            served_count: served,
            average_wait_minutes: mean(waits),
            average_system_time_minutes: mean(waits).map(|w| w + 1.0),
            average_service_minutes: (served > 0).then_some(1.0),
            max_wait_minutes: waits.iter().copied().reduce(f64::max),
            average_queue_length: 0.0,
            utilization: vec![0.5],
        };
        RunReport {
            metrics,
            arrivals: served,
            in_flight: 0,
            max_queue_length: 0,
            termination: Termination::Horizon,
            window_minutes: 10.0,
            seed: 0,
            customers,
            trace: None,
        }
    }

    #[test]
    fn test_mean_and_sample_std() {
        assert_eq!(mean(&[]), None);
        assert_eq!(sample_std(&[3.0]), None);
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]).unwrap(), 2.0);
        assert_relative_eq!(sample_std(&[1.0, 2.0, 3.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_summary_across_runs() {
        let reports = vec![report(&[0.0, 2.0]), report(&[4.0]), report(&[])];

        let summary = ReplicationSummary::from_reports(&reports);

        assert_eq!(summary.total_runs, 3);
        assert_eq!(summary.total_served, 3);
        assert_relative_eq!(summary.mean_served_per_run, 1.0);
        assert_eq!(summary.runs_with_service, 2);
        // per-run averages 1.0 and 4.0
        assert_relative_eq!(summary.mean_average_wait.unwrap(), 2.5);
        assert_relative_eq!(summary.std_average_wait.unwrap(), 4.5f64.sqrt());
        assert_relative_eq!(summary.mean_max_wait.unwrap(), 3.0);
        // pooled waits 0, 2, 4
        assert_relative_eq!(summary.overall_average_wait.unwrap(), 2.0);
        assert_eq!(summary.overall_max_wait, Some(4.0));
        assert_relative_eq!(summary.overall_average_service.unwrap(), 1.0);

        let (low, high) = summary.wait_ci95.unwrap();
        assert_relative_eq!((low + high) / 2.0, 2.5);
        assert_relative_eq!(high - low, 2.0 * Z_95 * 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_summary_single_run_has_no_interval() {
        let summary = ReplicationSummary::from_reports(&[report(&[1.0, 3.0])]);
        assert_relative_eq!(summary.mean_average_wait.unwrap(), 2.0);
        assert_eq!(summary.std_average_wait, None);
        assert_eq!(summary.wait_ci95, None);
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = ReplicationSummary::from_reports(&[]);
        assert_eq!(summary.total_runs, 0);
        assert_eq!(summary.mean_served_per_run, 0.0);
        assert_eq!(summary.mean_average_wait, None);
        assert_eq!(summary.overall_max_wait, None);
    }

    #[test]
    fn test_replications_use_consecutive_seeds() {
        let config = SimConfig::new(2, 1.0, 1.5, 60.0)
            .with_seed(1000)
            .validate()
            .unwrap();

        let reports = run_replications(&config, 4, Some(2)).unwrap();

        let seeds: Vec<u64> = reports.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![1000, 1001, 1002, 1003]);
    }
}
