use std::sync::Arc;

use tracing::debug;

use crate::{
    context::RunContext,
    item::{LabelScheme, WorkItem},
    sync::shutdown::ProducerGuard,
    HarnessError,
};

use super::Workload;

/// What a producer reports once its loop has finished.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProducerSummary {
    pub id: u32,
    pub generated: u32,
}

/// Generates `items` work items and enqueues each of them.
///
/// The worker holds its `ProducerGuard` until `run` returns, so shutdown cannot be
/// signaled while it may still push.
pub struct ProducerWorker {
    id: u32,
    items: u32,
    scheme: LabelScheme,
    ctx: Arc<RunContext>,
    workload: Arc<dyn Workload>,
    guard: ProducerGuard,
}

impl ProducerWorker {
    /// Registers the producer with the context's shutdown coordinator immediately.
    ///
    /// Fails with `ShutdownAlreadySignaled` if the run has already finished.
    pub fn new(
        id: u32,
        items: u32,
        scheme: LabelScheme,
        ctx: Arc<RunContext>,
        workload: Arc<dyn Workload>,
    ) -> Result<Self, HarnessError> {
        let guard = ctx.register_producer()?;
        Ok(Self {
            id,
            items,
            scheme,
            ctx,
            workload,
            guard,
        })
    }

    pub fn run(self) -> ProducerSummary {
        for index in 0..self.items {
            self.workload.generate(self.id, index);
            let item = WorkItem::new(self.id, index, self.scheme);
            let label = item.label().to_owned();
            let serial = self.ctx.enqueue(item);
            debug!(producer = self.id, serial, %label, "generated");
        }
        drop(self.guard);
        ProducerSummary {
            id: self.id,
            generated: self.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::Immediate;

    #[test]
    fn pushes_every_item_in_order() {
        let ctx = Arc::new(RunContext::new());
        let producer = ProducerWorker::new(
            4,
            3,
            LabelScheme::Legacy,
            Arc::clone(&ctx),
            Arc::new(Immediate),
        )
        .unwrap();
        assert_eq!(ctx.shutdown().live_producers(), 1);

        let summary = producer.run();
        assert_eq!(summary, ProducerSummary { id: 4, generated: 3 });
        assert_eq!(ctx.shutdown().live_producers(), 0);

        let labels: Vec<String> = std::iter::from_fn(|| ctx.queue().try_dequeue())
            .map(|d| d.item.label().to_owned())
            .collect();
        assert_eq!(labels, vec!["Image 400", "Image 401", "Image 402"]);
    }

    #[test]
    fn zero_items_still_releases_guard() {
        let ctx = Arc::new(RunContext::new());
        let producer = ProducerWorker::new(
            1,
            0,
            LabelScheme::Qualified,
            Arc::clone(&ctx),
            Arc::new(Immediate),
        )
        .unwrap();
        producer.run();
        assert!(ctx.signal_finished().is_ok());
        assert_eq!(ctx.metrics().total_generated(), 0);
    }

    #[test]
    fn cannot_start_after_shutdown() {
        let ctx = Arc::new(RunContext::new());
        ctx.signal_finished().unwrap();

        let late = ProducerWorker::new(
            2,
            5,
            LabelScheme::Qualified,
            Arc::clone(&ctx),
            Arc::new(Immediate),
        );
        assert!(matches!(late, Err(HarnessError::ShutdownAlreadySignaled)));
        assert_eq!(ctx.shutdown().live_producers(), 0);
        assert!(ctx.queue().is_empty());
    }
}
