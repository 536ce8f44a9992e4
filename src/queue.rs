//! Deduplicating FIFO job queues.
//!
//! A [`JobQueue`] wraps one service (connectivity or crawl) behind an
//! unbounded MPSC channel with exactly one consumer task — the channel is
//! the FIFO, the single consumer is the "one logical worker", and there is
//! no running flag to race on. A pending set keyed by source id gives O(1)
//! dedup: a second enqueue for an id that is already queued or running is
//! a no-op until that job finishes.
//!
//! Job outcomes never propagate to the enqueuer; they are logged and
//! observable only through the status broadcaster. Once dequeued, a job
//! runs to completion — there is no cancellation.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::broadcast::{JobState, StatusBroadcaster};
use crate::error::CoreError;

/// The service side of a queue: one job per source id.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    /// Queue name used in logs and job broadcasts.
    fn queue_name(&self) -> &'static str;

    /// Execute the job for one source. An `Err` is a failed job; it is
    /// recorded by the service itself before being returned here.
    async fn run(&self, source_id: &str) -> Result<(), CoreError>;
}

/// Outcome of an enqueue attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Enqueued {
    /// `false` means the id was already pending and nothing was added.
    pub queued: bool,
}

/// A dedup FIFO queue with a single consumer task.
pub struct JobQueue {
    name: &'static str,
    tx: mpsc::UnboundedSender<String>,
    pending: Arc<Mutex<HashSet<String>>>,
    broadcaster: StatusBroadcaster,
}

impl JobQueue {
    /// Spawn the consumer task and return the queue handle. The task ends
    /// when the last handle is dropped.
    pub fn start(runner: Arc<dyn JobRunner>, broadcaster: StatusBroadcaster) -> Self {
        let name = runner.queue_name();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let pending = Arc::new(Mutex::new(HashSet::new()));

        let worker_pending = pending.clone();
        let worker_broadcaster = broadcaster.clone();
        tokio::spawn(async move {
            while let Some(source_id) = rx.recv().await {
                worker_broadcaster.notify_job(name, &source_id, JobState::Running);

                let result = runner.run(&source_id).await;

                // Free the slot before announcing the outcome so that a
                // subscriber reacting to the terminal event can re-enqueue
                // immediately.
                worker_pending
                    .lock()
                    .expect("pending set lock poisoned")
                    .remove(&source_id);

                match result {
                    Ok(()) => {
                        tracing::info!(queue = name, source_id = %source_id, "job completed");
                        worker_broadcaster.notify_job(name, &source_id, JobState::Completed);
                    }
                    Err(e) => {
                        tracing::warn!(queue = name, source_id = %source_id, error = %e, "job failed");
                        worker_broadcaster.notify_job(name, &source_id, JobState::Failed);
                    }
                }
            }
        });

        Self {
            name,
            tx,
            pending,
            broadcaster,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Add a job for `source_id` unless one is already pending. Returns
    /// `Err` only if the worker task is gone.
    pub fn enqueue(&self, source_id: &str) -> Result<Enqueued, CoreError> {
        {
            let mut pending = self.pending.lock().expect("pending set lock poisoned");
            if !pending.insert(source_id.to_string()) {
                tracing::debug!(
                    queue = self.name,
                    source_id = %source_id,
                    "already pending, enqueue skipped"
                );
                return Ok(Enqueued { queued: false });
            }
        }

        // Announce before handing the id to the worker: the broadcast
        // channel preserves send order, so subscribers always see `queued`
        // before the worker's `running`.
        self.broadcaster
            .notify_job(self.name, source_id, JobState::Queued);

        if self.tx.send(source_id.to_string()).is_err() {
            self.pending
                .lock()
                .expect("pending set lock poisoned")
                .remove(source_id);
            return Err(CoreError::Internal(format!(
                "{} queue worker has shut down",
                self.name
            )));
        }

        Ok(Enqueued { queued: true })
    }

    /// Enqueue each id, skipping those already pending. Returns the count
    /// actually queued.
    pub fn enqueue_all<I, S>(&self, source_ids: I) -> Result<usize, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut queued = 0;
        for id in source_ids {
            if self.enqueue(id.as_ref())?.queued {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Number of jobs queued or running right now.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("pending set lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Runner that records execution order and can be gated shut.
    struct RecordingRunner {
        ran: Mutex<Vec<String>>,
        gated: Mutex<bool>,
    }

    impl RecordingRunner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                ran: Mutex::new(Vec::new()),
                gated: Mutex::new(false),
            })
        }

        fn close_gate(&self) {
            *self.gated.lock().unwrap() = true;
        }

        fn open_gate(&self) {
            *self.gated.lock().unwrap() = false;
        }

        fn ran(&self) -> Vec<String> {
            self.ran.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobRunner for RecordingRunner {
        fn queue_name(&self) -> &'static str {
            "test"
        }

        async fn run(&self, source_id: &str) -> Result<(), CoreError> {
            while *self.gated.lock().unwrap() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.ran.lock().unwrap().push(source_id.to_string());
            if source_id.starts_with("bad") {
                return Err(CoreError::Internal("boom".into()));
            }
            Ok(())
        }
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    #[tokio::test]
    async fn second_enqueue_while_pending_is_a_no_op() {
        let runner = RecordingRunner::new();
        runner.close_gate();
        let queue = JobQueue::start(runner.clone(), StatusBroadcaster::new(64));

        assert!(queue.enqueue("s1").unwrap().queued);
        assert!(!queue.enqueue("s1").unwrap().queued);
        assert_eq!(queue.pending_len(), 1);

        runner.open_gate();
        wait_until(|| queue.pending_len() == 0).await;

        // Once the job completed, the id can be queued again.
        assert!(queue.enqueue("s1").unwrap().queued);
        wait_until(|| runner.ran().len() == 2).await;
    }

    #[tokio::test]
    async fn jobs_run_in_fifo_order() {
        let runner = RecordingRunner::new();
        runner.close_gate();
        let queue = JobQueue::start(runner.clone(), StatusBroadcaster::new(64));

        for id in ["a", "b", "c"] {
            assert!(queue.enqueue(id).unwrap().queued);
        }
        runner.open_gate();
        wait_until(|| queue.pending_len() == 0).await;

        assert_eq!(runner.ran(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failed_jobs_free_their_slot() {
        let runner = RecordingRunner::new();
        let queue = JobQueue::start(runner.clone(), StatusBroadcaster::new(64));

        assert!(queue.enqueue("bad1").unwrap().queued);
        wait_until(|| queue.pending_len() == 0).await;

        assert!(queue.enqueue("bad1").unwrap().queued);
        wait_until(|| runner.ran().len() == 2).await;
    }

    #[tokio::test]
    async fn enqueue_all_reports_dedup_aware_count() {
        let runner = RecordingRunner::new();
        runner.close_gate();
        let queue = JobQueue::start(runner.clone(), StatusBroadcaster::new(64));

        let queued = queue.enqueue_all(["a", "b", "a", "c", "b"]).unwrap();
        assert_eq!(queued, 3);

        runner.open_gate();
        wait_until(|| queue.pending_len() == 0).await;
    }

    // Multi-threaded on purpose: the worker task can run concurrently with
    // the enqueuer, so `queued` must already be in the broadcast channel
    // before the worker can emit `running`.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn job_events_follow_queued_running_terminal() {
        let runner = RecordingRunner::new();
        let broadcaster = StatusBroadcaster::new(64);
        let mut rx = broadcaster.subscribe();
        let queue = JobQueue::start(runner, broadcaster);

        for id in ["a", "b", "c"] {
            queue.enqueue(id).unwrap();
        }

        let mut per_id: std::collections::HashMap<String, Vec<JobState>> =
            std::collections::HashMap::new();
        let mut seen = 0;
        while seen < 9 {
            if let crate::broadcast::StatusEvent::Job {
                source_id, state, ..
            } = rx.recv().await.unwrap()
            {
                per_id.entry(source_id).or_default().push(state);
                seen += 1;
            }
        }
        for id in ["a", "b", "c"] {
            assert_eq!(
                per_id[id],
                vec![JobState::Queued, JobState::Running, JobState::Completed],
                "event order for job {}",
                id
            );
        }
    }
}
