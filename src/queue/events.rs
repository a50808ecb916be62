//! Job lifecycle event bus (spec.md §4.3).
//!
//! Grounded on the teacher's `events/bus.rs` broadcast-channel pattern:
//! a single `tokio::sync::broadcast` fan-out, non-blocking delivery,
//! lagging subscribers silently drop the oldest events rather than
//! stalling the queue.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum QueueEvent {
    JobEnqueued { job_id: Uuid },
    JobStarted { job_id: Uuid },
    JobCompleted { job_id: Uuid },
    JobFailed { job_id: Uuid, error: String },
    JobRetry { job_id: Uuid, error: String },
    JobTimeout { job_id: Uuid },
}

#[derive(Clone)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<QueueEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    /// Non-blocking delivery: if there are no subscribers, or a
    /// subscriber lags, the send is simply dropped/lagged. Never blocks
    /// the scheduler loop.
    pub fn emit(&self, event: QueueEvent) {
        let _ = self.sender.send(event);
    }
}
