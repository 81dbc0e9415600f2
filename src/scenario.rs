//! Scenario configuration and the runner that drives one producer/consumer case.
//!
//! A run always follows the same sequence: fresh `RunContext`, consumers spawned,
//! producers spawned, producers joined, shutdown signaled, consumers joined,
//! integrity validated.
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{info, warn};

use crate::{
    context::RunContext,
    item::LabelScheme,
    logging::deliveries::DeliveryLog,
    validate::{validate, IntegrityReport},
    worker::{
        ConsumerState, ConsumerSummary, ConsumerWorker, Immediate, ProducerSummary,
        ProducerWorker, WorkerRole, Workload,
    },
    HarnessError,
};

/// Parameters of a single case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub producers: u32,
    pub consumers: u32,
    pub items_per_producer: u32,
    pub label_scheme: LabelScheme,
}

impl Scenario {
    /// One producer, one consumer, no items, qualified labels.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            producers: 1,
            consumers: 1,
            items_per_producer: 0,
            label_scheme: LabelScheme::default(),
        }
    }

    pub fn producers(mut self, producers: u32) -> Self {
        self.producers = producers;
        self
    }

    pub fn consumers(mut self, consumers: u32) -> Self {
        self.consumers = consumers;
        self
    }

    pub fn items_per_producer(mut self, items: u32) -> Self {
        self.items_per_producer = items;
        self
    }

    pub fn label_scheme(mut self, scheme: LabelScheme) -> Self {
        self.label_scheme = scheme;
        self
    }

    pub fn total_items(&self) -> u64 {
        u64::from(self.producers) * u64::from(self.items_per_producer)
    }

    /// Rejects cases that can never drain.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.consumers == 0 && self.total_items() > 0 {
            return Err(HarnessError::InvalidScenario {
                reason: format!(
                    "'{}' generates {} items but has no consumers",
                    self.name,
                    self.total_items()
                ),
            });
        }
        Ok(())
    }

    /// The six producer/consumer ratios the harness has always been exercised with.
    pub fn historical_suite() -> Vec<Scenario> {
        [
            ("Concurrent Access - Limited Capacity", 10, 1, 5),
            ("Excess Producers over Consumers", 10, 2, 5),
            ("Multiple Consumers - Few Producers", 2, 10, 3),
            ("Balanced Distribution", 3, 3, 4),
            ("Clean Termination - Stress Test", 5, 3, 20),
            ("Single Producer - Multiple Consumers", 1, 5, 10),
        ]
        .into_iter()
        .map(|(name, producers, consumers, items)| {
            Scenario::new(name)
                .producers(producers)
                .consumers(consumers)
                .items_per_producer(items)
                .label_scheme(LabelScheme::Legacy)
        })
        .collect()
    }
}

/// Everything a caller needs to report on a finished case.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: String,
    pub success: bool,
    pub generated: u64,
    pub processed: u64,
    pub max_depth: usize,
    pub duration_ms: u64,
    pub report: IntegrityReport,
    pub producers: Vec<ProducerSummary>,
    pub consumers: Vec<ConsumerSummary>,
    pub deliveries: DeliveryLog,
}

impl ScenarioOutcome {
    pub fn all_consumers_terminated(&self) -> bool {
        self.consumers
            .iter()
            .all(|c| c.state == ConsumerState::Terminated)
    }

    /// Turns a failed validation into an error.
    pub fn into_result(self) -> Result<Self, HarnessError> {
        if self.success {
            return Ok(self);
        }
        Err(HarnessError::IntegrityViolation {
            scenario: self.name,
            summary: self.report.summary(),
        })
    }
}

/// Drives scenarios with a shared latency model.
#[derive(Clone)]
pub struct ScenarioRunner {
    workload: Arc<dyn Workload>,
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        ScenarioRunner::new(Immediate)
    }
}

impl ScenarioRunner {
    pub fn new(workload: impl Workload + 'static) -> Self {
        Self {
            workload: Arc::new(workload),
        }
    }

    pub fn run(&self, scenario: &Scenario) -> Result<ScenarioOutcome, HarnessError> {
        self.run_in(Arc::new(RunContext::new()), scenario)
    }

    fn run_in(
        &self,
        ctx: Arc<RunContext>,
        scenario: &Scenario,
    ) -> Result<ScenarioOutcome, HarnessError> {
        scenario.validate()?;
        info!(
            scenario = %scenario.name,
            producers = scenario.producers,
            consumers = scenario.consumers,
            items_per_producer = scenario.items_per_producer,
            labels = %scenario.label_scheme,
            "starting scenario"
        );

        let started = Instant::now();
        let mut failure: Option<HarnessError> = None;

        let mut consumers = Vec::with_capacity(scenario.consumers as usize);
        for id in 1..=scenario.consumers {
            let worker = ConsumerWorker::new(id, Arc::clone(&ctx), Arc::clone(&self.workload));
            match spawn(WorkerRole::Consumer, id, move || worker.run()) {
                Ok(handle) => consumers.push((id, handle)),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let mut producers = Vec::with_capacity(scenario.producers as usize);
        if failure.is_none() {
            for id in 1..=scenario.producers {
                let worker = match ProducerWorker::new(
                    id,
                    scenario.items_per_producer,
                    scenario.label_scheme,
                    Arc::clone(&ctx),
                    Arc::clone(&self.workload),
                ) {
                    Ok(worker) => worker,
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                };
                // a failed spawn drops the worker, releasing its producer guard
                match spawn(WorkerRole::Producer, id, move || worker.run()) {
                    Ok(handle) => producers.push((id, handle)),
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
        }

        let producer_summaries = join_all(WorkerRole::Producer, producers, &mut failure);
        if let Err(err) = ctx.signal_finished() {
            failure.get_or_insert(err);
        }
        let consumer_summaries = join_all(WorkerRole::Consumer, consumers, &mut failure);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Some(err) = failure {
            warn!(scenario = %scenario.name, %err, "scenario aborted");
            return Err(err);
        }

        let deliveries = DeliveryLog::merge(consumer_summaries.iter().map(|c| &c.deliveries));
        let report = validate(&ctx.metrics().snapshot(), &ctx.queue().stats(), &deliveries);
        let success = report.is_success();
        info!(
            scenario = %scenario.name,
            success,
            generated = report.total_generated,
            processed = report.total_processed,
            max_depth = report.max_depth,
            duration_ms,
            "scenario finished"
        );

        Ok(ScenarioOutcome {
            name: scenario.name.clone(),
            success,
            generated: report.total_generated,
            processed: report.total_processed,
            max_depth: report.max_depth,
            duration_ms,
            report,
            producers: producer_summaries,
            consumers: consumer_summaries,
            deliveries,
        })
    }

    /// Runs every scenario in order; a worker failure in one case stops the sequence.
    pub fn run_all(&self, scenarios: &[Scenario]) -> Result<Vec<ScenarioOutcome>, HarnessError> {
        scenarios.iter().map(|s| self.run(s)).collect()
    }
}

/// Runs an ad hoc case with qualified labels and no simulated latency.
pub fn run_scenario(
    producers: u32,
    consumers: u32,
    items_per_producer: u32,
) -> Result<ScenarioOutcome, HarnessError> {
    let scenario = Scenario::new(format!("{producers}x{items_per_producer} -> {consumers}"))
        .producers(producers)
        .consumers(consumers)
        .items_per_producer(items_per_producer);
    ScenarioRunner::default().run(&scenario)
}

fn spawn<T, F>(role: WorkerRole, id: u32, body: F) -> Result<JoinHandle<T>, HarnessError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(format!("{role}-{id}"))
        .spawn(body)?;
    Ok(handle)
}

fn join_all<T>(
    role: WorkerRole,
    handles: Vec<(u32, JoinHandle<T>)>,
    failure: &mut Option<HarnessError>,
) -> Vec<T> {
    let mut summaries = Vec::with_capacity(handles.len());
    for (id, handle) in handles {
        match handle.join() {
            Ok(summary) => summaries.push(summary),
            Err(_) => {
                failure.get_or_insert(HarnessError::WorkerPanicked { role, id });
            }
        }
    }
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::WorkItem;

    struct PanickingConsumer;

    impl Workload for PanickingConsumer {
        fn process(&self, item: &WorkItem, _consumer_id: u32) {
            if item.serial() == 2 {
                panic!("simulated processing failure");
            }
        }
    }

    #[test]
    fn builder_sets_every_field() {
        let s = Scenario::new("b")
            .producers(3)
            .consumers(4)
            .items_per_producer(7)
            .label_scheme(LabelScheme::Legacy);
        assert_eq!(s.producers, 3);
        assert_eq!(s.consumers, 4);
        assert_eq!(s.items_per_producer, 7);
        assert_eq!(s.label_scheme, LabelScheme::Legacy);
        assert_eq!(s.total_items(), 21);
    }

    #[test]
    fn no_consumers_is_rejected() {
        let s = Scenario::new("orphan").producers(2).consumers(0).items_per_producer(1);
        assert!(matches!(
            ScenarioRunner::default().run(&s),
            Err(HarnessError::InvalidScenario { .. })
        ));
        // nothing to deliver, nothing to reject
        let empty = Scenario::new("empty").consumers(0);
        assert!(empty.validate().is_ok());
    }

    #[test]
    fn historical_suite_has_six_unique_label_cases() {
        let suite = Scenario::historical_suite();
        assert_eq!(suite.len(), 6);
        for s in &suite {
            let limit = s.label_scheme.unique_limit().unwrap();
            assert!(s.items_per_producer < limit, "{} would collide", s.name);
        }
    }

    #[test]
    fn worker_panic_is_reported_and_run_still_terminates() {
        let runner = ScenarioRunner::new(PanickingConsumer);
        let s = Scenario::new("panics").producers(1).consumers(2).items_per_producer(4);
        let err = runner.run(&s).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::WorkerPanicked {
                role: WorkerRole::Consumer,
                ..
            }
        ));
    }

    #[test]
    fn finished_context_is_reported_and_consumers_joined() {
        let ctx = Arc::new(RunContext::new());
        ctx.signal_finished().unwrap();

        let idle = Scenario::new("already finished").producers(0).consumers(3);
        let err = ScenarioRunner::default()
            .run_in(Arc::clone(&ctx), &idle)
            .unwrap_err();
        assert_eq!(err, HarnessError::ShutdownAlreadySignaled);
        assert_eq!(ctx.queue().waiting(), 0);

        let late = Scenario::new("late producers")
            .producers(2)
            .consumers(2)
            .items_per_producer(3);
        let err = ScenarioRunner::default()
            .run_in(Arc::clone(&ctx), &late)
            .unwrap_err();
        assert_eq!(err, HarnessError::ShutdownAlreadySignaled);
        assert_eq!(ctx.shutdown().live_producers(), 0);
        assert_eq!(ctx.metrics().total_generated(), 0);
    }

    #[test]
    fn failed_outcome_converts_to_error() {
        let s = Scenario::new("collide")
            .producers(2)
            .consumers(2)
            .items_per_producer(101)
            .label_scheme(LabelScheme::Legacy);
        let outcome = ScenarioRunner::default().run(&s).unwrap();
        assert!(!outcome.success);
        match outcome.into_result() {
            Err(HarnessError::IntegrityViolation { scenario, summary }) => {
                assert_eq!(scenario, "collide");
                assert!(summary.contains("distinct labels"), "{summary}");
            }
            other => panic!("expected integrity violation, got {other:?}"),
        }
    }

    #[test]
    fn run_scenario_reports_counts() {
        let outcome = run_scenario(3, 2, 4).unwrap();
        assert!(outcome.success, "{}", outcome.report.summary());
        assert_eq!(outcome.generated, 12);
        assert_eq!(outcome.processed, 12);
        assert_eq!(outcome.producers.len(), 3);
        assert_eq!(outcome.consumers.len(), 2);
        assert!(outcome.all_consumers_terminated());
        assert_eq!(outcome.deliveries.len(), 12);
    }
}
