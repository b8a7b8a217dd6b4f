//! Bank queue simulation - batch runner
//!
//! Runs an experiment's replications and prints the results.
//!
//! Usage:
//!   cargo run --release -p bank_queue -- [experiments/eight_hour_day.toml] [--json]
//!
//! Without a file the built-in eight hour day is used. `RUST_LOG=debug`
//! shows every customer arriving, starting service and leaving.

use std::env;
use std::process::ExitCode;

use bank_queue::{ExperimentConfig, ReplicationSummary, RunReport, SimError, run_replications};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct JsonOutput<'a> {
    experiment: &'a ExperimentConfig,
    summary: &'a ReplicationSummary,
    runs: &'a [RunReport],
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), SimError> {
    let args: Vec<String> = env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let experiment = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::eight_hour_day(),
    };

    let config = experiment.model.clone().validate()?;
    let reports = run_replications(
        &config,
        experiment.experiment.replications,
        experiment.experiment.threads,
    )?;
    let summary = ReplicationSummary::from_reports(&reports);

    if json {
        let output = JsonOutput {
            experiment: &experiment,
            summary: &summary,
            runs: &reports,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_results(&experiment, &reports, &summary);
    }
    Ok(())
}

fn fmt_minutes(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2} minutes", v),
        None => "N/A".to_string(),
    }
}

fn print_results(experiment: &ExperimentConfig, reports: &[RunReport], summary: &ReplicationSummary) {
    let model = &experiment.model;
    println!("{}", "=".repeat(60));
    println!(
        "{} - {} simulation runs",
        experiment.experiment.name, summary.total_runs
    );
    println!("{}", "=".repeat(60));
    println!("Tellers: {}", model.teller_count);
    println!(
        "Mean interarrival: {} min, mean service: {} min, horizon: {} min",
        model.mean_interarrival_minutes, model.mean_service_minutes, model.horizon_minutes
    );
    println!("Total customers served: {}", summary.total_served);
    println!("Average customers per run: {:.1}", summary.mean_served_per_run);
    if summary.total_in_flight > 0 {
        println!(
            "Customers still inside at the horizon (excluded): {}",
            summary.total_in_flight
        );
    }

    println!("\n--- Waiting Time ---");
    match (summary.mean_average_wait, summary.std_average_wait) {
        (Some(m), Some(sd)) => println!("Average wait (across runs): {:.2} ± {:.2} minutes", m, sd),
        (m, _) => println!("Average wait (across runs): {}", fmt_minutes(m)),
    }
    if let Some((low, high)) = summary.wait_ci95 {
        println!("95% confidence interval: [{:.2}, {:.2}] minutes", low, high);
    }
    println!("Average maximum wait: {}", fmt_minutes(summary.mean_max_wait));
    println!(
        "Overall average wait (all customers): {}",
        fmt_minutes(summary.overall_average_wait)
    );
    println!("Overall maximum wait: {}", fmt_minutes(summary.overall_max_wait));

    println!("\n--- Service Time ---");
    println!("Average service: {}", fmt_minutes(summary.mean_average_service));
    println!(
        "Overall average service: {}",
        fmt_minutes(summary.overall_average_service)
    );

    println!("\n--- Individual Runs ---");
    for (i, report) in reports.iter().enumerate() {
        if report.served_count() == 0 {
            println!("Run {:2}: no customers served", i + 1);
            continue;
        }
        let utilization: Vec<String> = report
            .metrics
            .utilization
            .iter()
            .map(|u| format!("{:.0}%", u * 100.0))
            .collect();
        println!(
            "Run {:2}: {:3} customers, avg wait {:>14}, max wait {:>14}, avg queue {:5.2}, tellers busy [{}]",
            i + 1,
            report.served_count(),
            fmt_minutes(report.metrics.average_wait_minutes),
            fmt_minutes(report.metrics.max_wait_minutes),
            report.metrics.average_queue_length,
            utilization.join(", ")
        );
    }
}
