//! Status broadcast fan-out.
//!
//! Services report every status transition and every job lifecycle step
//! through a [`StatusBroadcaster`]. Delivery is fire-and-forget over a
//! tokio broadcast channel: no subscribers is fine, and a lagging
//! subscriber drops old events (at-most-once — consumers reconcile by
//! reloading the catalog).

use tokio::sync::broadcast;

use crate::status::{ConnectionStatus, CrawlStatus};

/// Lifecycle of a queued job, as observed through the broadcaster.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

/// A single status event. Connection and crawl transitions carry the new
/// state plus an optional error message; job events carry the queue name.
#[derive(Clone, Debug)]
pub enum StatusEvent {
    Connection {
        source_id: String,
        status: ConnectionStatus,
        message: Option<String>,
    },
    Crawl {
        source_id: String,
        status: CrawlStatus,
        message: Option<String>,
    },
    Job {
        queue: &'static str,
        source_id: String,
        state: JobState,
    },
}

impl StatusEvent {
    pub fn source_id(&self) -> &str {
        match self {
            StatusEvent::Connection { source_id, .. }
            | StatusEvent::Crawl { source_id, .. }
            | StatusEvent::Job { source_id, .. } => source_id,
        }
    }
}

/// Fan-out notifier for status events. Cheap to clone; all clones feed the
/// same channel.
#[derive(Clone)]
pub struct StatusBroadcaster {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusBroadcaster {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Never fails: an error just means nobody is listening.
    pub fn notify(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }

    pub fn notify_connection(
        &self,
        source_id: &str,
        status: ConnectionStatus,
        message: Option<String>,
    ) {
        self.notify(StatusEvent::Connection {
            source_id: source_id.to_string(),
            status,
            message,
        });
    }

    pub fn notify_crawl(&self, source_id: &str, status: CrawlStatus, message: Option<String>) {
        self.notify(StatusEvent::Crawl {
            source_id: source_id.to_string(),
            status,
            message,
        });
    }

    pub fn notify_job(&self, queue: &'static str, source_id: &str, state: JobState) {
        self.notify(StatusEvent::Job {
            queue,
            source_id: source_id.to_string(),
            state,
        });
    }
}
