use std::fmt::Display;
use std::sync::Arc;

use tracing::debug;

use crate::{
    context::RunContext,
    logging::deliveries::{DeliveryLog, DeliveryRecord},
};

use super::Workload;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConsumerState {
    Waiting,
    Processing,
    Terminated,
}

impl Display for ConsumerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumerState::Waiting => write!(f, "Waiting"),
            ConsumerState::Processing => write!(f, "Processing"),
            ConsumerState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// What a consumer hands back when it leaves its loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub id: u32,
    pub processed: u64,
    pub state: ConsumerState,
    pub deliveries: DeliveryLog,
}

/// Pops and processes items until the queue is drained and shutdown is signaled.
pub struct ConsumerWorker {
    id: u32,
    ctx: Arc<RunContext>,
    workload: Arc<dyn Workload>,
    state: ConsumerState,
    deliveries: DeliveryLog,
}

impl ConsumerWorker {
    pub fn new(id: u32, ctx: Arc<RunContext>, workload: Arc<dyn Workload>) -> Self {
        Self {
            id,
            ctx,
            workload,
            state: ConsumerState::Waiting,
            deliveries: DeliveryLog::new(),
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn run(mut self) -> ConsumerSummary {
        let mut processed: u64 = 0;
        // `wait_dequeue` only yields None once the queue is empty and shutdown is set
        while let Some(next) = self.ctx.wait_dequeue() {
            self.state = ConsumerState::Processing;
            debug!(
                consumer = self.id,
                serial = next.item.serial(),
                label = next.item.label(),
                "processing"
            );
            self.workload.process(&next.item, self.id);
            self.ctx.complete(&next.item);
            self.deliveries.push(DeliveryRecord::new(&next, self.id));
            processed += 1;
            self.state = ConsumerState::Waiting;
        }
        self.state = ConsumerState::Terminated;
        debug!(consumer = self.id, processed, "terminated");
        ConsumerSummary {
            id: self.id,
            processed,
            state: self.state,
            deliveries: self.deliveries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{LabelScheme, WorkItem};
    use crate::worker::Immediate;

    #[test]
    fn drains_backlog_after_shutdown() {
        let ctx = Arc::new(RunContext::new());
        for i in 0..5 {
            ctx.enqueue(WorkItem::new(1, i, LabelScheme::Qualified));
        }
        ctx.signal_finished().unwrap();

        let consumer = ConsumerWorker::new(1, Arc::clone(&ctx), Arc::new(Immediate));
        assert_eq!(consumer.state(), ConsumerState::Waiting);
        let summary = consumer.run();

        assert_eq!(summary.state, ConsumerState::Terminated);
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.deliveries.len(), 5);
        assert_eq!(summary.deliveries.out_of_order().count(), 0);
        assert_eq!(ctx.metrics().total_processed(), 5);
        assert!(ctx.queue().is_empty());
    }

    #[test]
    fn idle_consumer_terminates_on_shutdown() {
        let ctx = Arc::new(RunContext::new());
        let consumer = ConsumerWorker::new(3, Arc::clone(&ctx), Arc::new(Immediate));
        let handle = std::thread::spawn(move || consumer.run());

        while ctx.queue().waiting() < 1 {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        ctx.signal_finished().unwrap();

        let summary = handle.join().unwrap();
        assert_eq!(summary.state, ConsumerState::Terminated);
        assert_eq!(summary.processed, 0);
        assert!(summary.deliveries.is_empty());
    }
}
