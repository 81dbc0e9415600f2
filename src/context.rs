//! Per-run shared state.
//!
//! `RunContext` bundles the queue, the shutdown coordinator and the metrics of one
//! scenario and forwards the handful of calls workers make against them.
use crate::{
    comms::shared::{Dequeued, SharedQueue},
    item::WorkItem,
    metrics::RunMetrics,
    sync::shutdown::{ProducerGuard, ShutdownCoordinator},
    HarnessError,
};

/// Everything a single run shares between its workers.
///
/// A context is built fresh for every scenario and handed to each worker behind an
/// `Arc`, so no state leaks from one run into the next.
#[derive(Debug, Default)]
pub struct RunContext {
    queue: SharedQueue,
    shutdown: ShutdownCoordinator,
    metrics: RunMetrics,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn enqueue(&self, item: WorkItem) -> u64 {
        self.queue.enqueue(item, &self.metrics)
    }

    pub fn wait_dequeue(&self) -> Option<Dequeued> {
        self.queue.wait_dequeue(&self.shutdown)
    }

    /// Records that `item` was fully processed by a consumer.
    pub fn complete(&self, item: &WorkItem) {
        self.metrics.record_processed(item);
    }

    pub fn register_producer(&self) -> Result<ProducerGuard, HarnessError> {
        self.shutdown.register_producer()
    }

    pub fn signal_finished(&self) -> Result<(), HarnessError> {
        self.shutdown.signal_finished(&self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::LabelScheme;

    #[test]
    fn fresh_contexts_share_nothing() {
        let first = RunContext::new();
        first.enqueue(WorkItem::new(1, 0, LabelScheme::Qualified));
        first.signal_finished().unwrap();

        let second = RunContext::new();
        assert_eq!(second.queue().depth(), 0);
        assert_eq!(second.metrics().total_generated(), 0);
        assert!(!second.shutdown().is_finished());
    }

    #[test]
    fn full_handoff_through_context() {
        let ctx = RunContext::new();
        let guard = ctx.register_producer().unwrap();
        ctx.enqueue(WorkItem::new(1, 0, LabelScheme::Qualified));
        drop(guard);
        ctx.signal_finished().unwrap();

        let got = ctx.wait_dequeue().expect("item drained after shutdown");
        ctx.complete(&got.item);
        assert!(ctx.wait_dequeue().is_none());

        let snap = ctx.metrics().snapshot();
        assert_eq!(snap.total_generated, snap.total_processed);
    }

    #[test]
    fn no_producer_joins_a_finished_run() {
        let ctx = RunContext::new();
        ctx.signal_finished().unwrap();

        assert_eq!(
            ctx.register_producer().unwrap_err(),
            HarnessError::ShutdownAlreadySignaled
        );
        assert_eq!(ctx.shutdown().live_producers(), 0);
        assert_eq!(ctx.queue().depth(), 0);
    }
}
