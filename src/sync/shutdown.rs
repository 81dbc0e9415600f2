use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::{AcqRel, Acquire};
use std::sync::Arc;

use tracing::debug;

use crate::{comms::shared::SharedQueue, HarnessError};

use super::ShutdownState;

/// Set once the run is finished; the remaining bits count live producers.
const FINISHED: usize = 1 << (usize::BITS - 1);

/// One-way "producers finished" flag for a single run.
///
/// Producers hold a `ProducerGuard` for as long as they may enqueue. Once every
/// guard is gone, `signal_finished` flips the flag and broadcasts on the queue's
/// condition so that every parked consumer re-evaluates its predicate.
///
/// The flag and the live-producer count share one atomic word, so registering a
/// producer and finishing the run can never interleave.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    state: Arc<AtomicUsize>,
}

/// Marks one registered producer as running. Dropping it, including during a
/// panic unwind, marks the producer as terminated.
#[derive(Debug)]
pub struct ProducerGuard {
    state: Arc<AtomicUsize>,
}

impl Drop for ProducerGuard {
    fn drop(&mut self) {
        // FINISHED is only ever set with a zero count, so this never borrows from it
        self.state.fetch_sub(1, AcqRel);
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a producer. Must be called before that producer's thread is spawned,
    /// otherwise `signal_finished` could run while the producer is unaccounted for.
    ///
    /// Fails once the run is finished, since consumers may already have left.
    pub fn register_producer(&self) -> Result<ProducerGuard, HarnessError> {
        let mut current = self.state.load(Acquire);
        loop {
            if current & FINISHED != 0 {
                return Err(HarnessError::ShutdownAlreadySignaled);
            }
            match self
                .state
                .compare_exchange_weak(current, current + 1, AcqRel, Acquire)
            {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        Ok(ProducerGuard {
            state: Arc::clone(&self.state),
        })
    }

    pub fn live_producers(&self) -> usize {
        self.state.load(Acquire) & !FINISHED
    }

    pub fn is_finished(&self) -> bool {
        self.state.load(Acquire) & FINISHED != 0
    }

    pub fn state(&self) -> ShutdownState {
        if self.is_finished() {
            ShutdownState::Finished
        } else {
            ShutdownState::Active
        }
    }

    /// Transitions `Active -> Finished` and wakes every consumer waiting on `queue`.
    ///
    /// Fails without side effects if a registered producer is still running or if the
    /// run was already finished.
    pub fn signal_finished(&self, queue: &SharedQueue) -> Result<(), HarnessError> {
        if let Err(observed) = self.state.compare_exchange(0, FINISHED, AcqRel, Acquire) {
            if observed & FINISHED != 0 {
                return Err(HarnessError::ShutdownAlreadySignaled);
            }
            return Err(HarnessError::ProducersStillActive(observed));
        }
        let woken = queue.wake_all();
        debug!(woken, "shutdown signaled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn starts_active_and_finishes_once() {
        let queue = SharedQueue::new();
        let shutdown = ShutdownCoordinator::new();
        assert_eq!(shutdown.state(), ShutdownState::Active);

        shutdown.signal_finished(&queue).unwrap();
        assert_eq!(shutdown.state(), ShutdownState::Finished);
        assert_eq!(
            shutdown.signal_finished(&queue).unwrap_err(),
            HarnessError::ShutdownAlreadySignaled
        );
        assert!(shutdown.is_finished());
    }

    #[test]
    fn refuses_while_producers_are_live() {
        let queue = SharedQueue::new();
        let shutdown = ShutdownCoordinator::new();
        let first = shutdown.register_producer().unwrap();
        let second = shutdown.register_producer().unwrap();

        assert_eq!(
            shutdown.signal_finished(&queue).unwrap_err(),
            HarnessError::ProducersStillActive(2)
        );
        drop(first);
        assert_eq!(
            shutdown.signal_finished(&queue).unwrap_err(),
            HarnessError::ProducersStillActive(1)
        );
        assert_eq!(shutdown.state(), ShutdownState::Active);

        drop(second);
        shutdown.signal_finished(&queue).unwrap();
    }

    #[test]
    fn late_registration_is_rejected() {
        let queue = SharedQueue::new();
        let shutdown = ShutdownCoordinator::new();
        shutdown.signal_finished(&queue).unwrap();

        assert_eq!(
            shutdown.register_producer().unwrap_err(),
            HarnessError::ShutdownAlreadySignaled
        );
        assert_eq!(shutdown.live_producers(), 0);
        assert!(shutdown.is_finished());
    }

    #[test]
    fn registration_racing_shutdown_never_outlives_it() {
        for _ in 0..200 {
            let queue = Arc::new(SharedQueue::new());
            let shutdown = Arc::new(ShutdownCoordinator::new());

            let registrar = {
                let shutdown = Arc::clone(&shutdown);
                thread::spawn(move || shutdown.register_producer().ok())
            };
            let signaled = shutdown.signal_finished(&queue);
            let guard = registrar.join().unwrap();

            match (signaled, guard) {
                // producer won: the signal saw it and refused
                (Err(HarnessError::ProducersStillActive(1)), Some(_)) => {
                    assert!(!shutdown.is_finished())
                }
                // signal won: the producer was turned away
                (Ok(()), None) => assert_eq!(shutdown.live_producers(), 0),
                (Ok(()), Some(_)) => panic!("producer registered after shutdown"),
                (other, _) => panic!("unexpected signal result {other:?}"),
            }
        }
    }

    #[test]
    fn guard_released_when_producer_panics() {
        let shutdown = ShutdownCoordinator::new();
        let guard = shutdown.register_producer().unwrap();
        let handle = thread::spawn(move || {
            let _guard = guard;
            panic!("producer blew up");
        });
        assert!(handle.join().is_err());
        assert_eq!(shutdown.live_producers(), 0);
    }

    #[test]
    fn wakes_every_parked_consumer() {
        let queue = Arc::new(SharedQueue::new());
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (tx, rx) = mpsc::channel();

        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            let shutdown = Arc::clone(&shutdown);
            let tx = tx.clone();
            thread::spawn(move || {
                let _ = tx.send(queue.wait_dequeue(&shutdown));
            });
        }
        drop(tx);

        // every consumer must be parked before the broadcast for this to mean anything
        while queue.waiting() < 8 {
            thread::sleep(Duration::from_millis(1));
        }
        shutdown.signal_finished(&queue).unwrap();

        for woken in 0..8 {
            match rx.recv_timeout(Duration::from_secs(5)) {
                Ok(got) => assert!(got.is_none(), "idle consumer saw no work"),
                Err(_) => panic!("{} consumer(s) still parked after shutdown", 8 - woken),
            }
        }
        assert_eq!(queue.waiting(), 0);
    }
}
