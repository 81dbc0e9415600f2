//! Runs producer/consumer handoff scenarios and prints their integrity reports.
//!
//! Without explicit counts the historical suite of six cases is executed. The
//! process exits non-zero if any case fails validation.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use handoff::{
    worker::{Immediate, RandomDelay},
    HarnessError, LabelScheme, Scenario, ScenarioOutcome, ScenarioRunner,
};

#[derive(Debug, Parser)]
#[command(name = "scenarios", about = "Producer/consumer handoff integrity harness")]
struct Args {
    /// Number of producer threads for a single ad hoc case
    #[arg(long)]
    producers: Option<u32>,
    /// Number of consumer threads for a single ad hoc case
    #[arg(long)]
    consumers: Option<u32>,
    /// Items generated by each producer
    #[arg(long)]
    items: Option<u32>,
    /// Derive labels as producer*100+index, which collides past 100 items
    #[arg(long)]
    legacy_labels: bool,
    /// Skip the simulated generation and processing latency
    #[arg(long)]
    fast: bool,
    /// Seed for the simulated latency
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
    /// Directory to write one raw delivery trace per scenario into
    #[arg(long)]
    trace: Option<PathBuf>,
}

impl Args {
    fn scenarios(&self) -> Vec<Scenario> {
        if self.producers.is_none() && self.consumers.is_none() && self.items.is_none() {
            let mut suite = Scenario::historical_suite();
            if !self.legacy_labels {
                suite = suite
                    .into_iter()
                    .map(|s| s.label_scheme(LabelScheme::Qualified))
                    .collect();
            }
            return suite;
        }
        let scheme = if self.legacy_labels {
            LabelScheme::Legacy
        } else {
            LabelScheme::Qualified
        };
        let producers = self.producers.unwrap_or(1);
        let consumers = self.consumers.unwrap_or(1);
        let items = self.items.unwrap_or(5);
        vec![Scenario::new(format!("{producers}x{items} -> {consumers}"))
            .producers(producers)
            .consumers(consumers)
            .items_per_producer(items)
            .label_scheme(scheme)]
    }

    fn runner(&self) -> ScenarioRunner {
        if self.fast {
            ScenarioRunner::new(Immediate)
        } else {
            ScenarioRunner::new(RandomDelay::new(100..300, 300..600, self.seed))
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("handoff=info"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .init();
}

fn print_outcome(scenario: &Scenario, outcome: &ScenarioOutcome) {
    let rule = "=".repeat(50);
    println!("\n{rule}");
    println!("TEST CASE: {}", scenario.name);
    println!(
        "Producers: {}, Consumers: {}, Items per producer: {}",
        scenario.producers, scenario.consumers, scenario.items_per_producer
    );
    println!("{rule}");
    println!("[SUMMARY] Total items generated: {}", outcome.generated);
    println!("[SUMMARY] Total items processed: {}", outcome.processed);
    println!("[SUMMARY] Execution time: {} ms", outcome.duration_ms);
    println!(
        "[SUMMARY] Queue empty at end: {}",
        if outcome.report.final_depth == 0 { "YES" } else { "NO" }
    );
    for (consumer, count) in outcome.deliveries.per_consumer() {
        println!("[SUMMARY] Consumer {consumer} processed: {count}");
    }

    let report = &outcome.report;
    println!("\n=== DATA INTEGRITY VALIDATION ===");
    println!(
        "All generated labels were processed: {}",
        if report.all_processed { "YES" } else { "NO" }
    );
    println!("Distinct labels generated: {}", report.generated_count);
    println!("Distinct labels processed: {}", report.processed_count);
    println!("Maximum queue depth: {}", report.max_depth);
    for d in &report.discrepancies {
        println!("Discrepancy: {d}");
    }
    println!(
        "\n[RESULT] Test case: {}",
        if outcome.success { "SUCCESSFUL" } else { "FAILED" }
    );
}

fn write_trace(dir: &Path, index: usize, outcome: &ScenarioOutcome) -> Result<(), HarnessError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("scenario-{}.trace", index + 1));
    fs::write(&path, outcome.deliveries.as_bytes())?;
    tracing::info!(
        path = %path.display(),
        records = outcome.deliveries.len(),
        "wrote delivery trace"
    );
    Ok(())
}

fn run(args: &Args) -> Result<bool, HarnessError> {
    let runner = args.runner();
    let mut all_passed = true;
    for (index, scenario) in args.scenarios().iter().enumerate() {
        let outcome = runner.run(scenario)?;
        print_outcome(scenario, &outcome);
        if let Some(dir) = &args.trace {
            write_trace(dir, index, &outcome)?;
        }
        all_passed &= outcome.success;
    }
    Ok(all_passed)
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => {
            println!("\nVALIDATION COMPLETED - ALL CASES PASSED");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("\nVALIDATION COMPLETED - SOME CASES FAILED");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!(%err, "harness aborted");
            ExitCode::from(2)
        }
    }
}
