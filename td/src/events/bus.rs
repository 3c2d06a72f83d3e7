//! Event Bus - central pub/sub system for scheduler events
//!
//! The EventBus uses tokio broadcast channels to deliver events to all subscribers
//! with minimal latency. Components emit events, consumers (CLI, loggers) subscribe.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::JobEvent;

/// Default channel capacity (events)
/// At ~100 events/second, this provides ~100 seconds of buffer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Central event bus for job orchestration activity
///
/// Every significant scheduler action emits an event to this bus.
/// All consumers (CLI, file logger, database) subscribe to receive events.
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>,
    #[allow(dead_code)]
    channel_capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            channel_capacity: capacity,
        }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// This is fire-and-forget: if there are no subscribers, the event is dropped.
    /// If the channel is full, oldest events are dropped.
    pub fn emit(&self, event: JobEvent) {
        debug!(
            event_type = event.event_type(),
            subject_id = event.subject_id(),
            "EventBus::emit"
        );
        // Ignore send errors (no subscribers is OK)
        let _ = self.tx.send(event);
    }

    /// Subscribe to receive events
    ///
    /// Returns a receiver that will receive all events emitted after subscription.
    /// Note: Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter handle bound to a job id
    ///
    /// The emitter provides convenience methods for emitting events
    /// and automatically includes the job id.
    pub fn emitter_for(&self, job_id: impl Into<String>) -> EventEmitter {
        let job_id = job_id.into();
        debug!(%job_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            subject_id: job_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for components to emit events without owning the bus
///
/// EventEmitter is cheap to clone and provides convenience methods
/// for emitting events with a pre-set subject id (a job id, or a
/// worker id for pool lifecycle events).
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<JobEvent>,
    subject_id: String,
}

impl EventEmitter {
    /// The id this emitter is bound to
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: JobEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn job_queued(&self, job_type: &str, priority: i32) {
        self.emit(JobEvent::JobQueued {
            job_id: self.subject_id.clone(),
            job_type: job_type.to_string(),
            priority,
        });
    }

    pub fn job_started(&self, worker_id: &str) {
        self.emit(JobEvent::JobStarted {
            job_id: self.subject_id.clone(),
            worker_id: worker_id.to_string(),
        });
    }

    pub fn job_completed(&self, duration_ms: u64, input_tokens: u64, output_tokens: u64) {
        self.emit(JobEvent::JobCompleted {
            job_id: self.subject_id.clone(),
            duration_ms,
            input_tokens,
            output_tokens,
        });
    }

    pub fn job_failed(&self, error: &str, retry_count: u32) {
        self.emit(JobEvent::JobFailed {
            job_id: self.subject_id.clone(),
            error: error.to_string(),
            retry_count,
        });
    }

    pub fn job_retry(&self, retry_count: u32, max_retries: u32) {
        self.emit(JobEvent::JobRetry {
            job_id: self.subject_id.clone(),
            retry_count,
            max_retries,
        });
    }

    pub fn job_waiting_input(&self) {
        self.emit(JobEvent::JobWaitingInput {
            job_id: self.subject_id.clone(),
        });
    }

    pub fn worker_spawned(&self) {
        self.emit(JobEvent::WorkerSpawned {
            worker_id: self.subject_id.clone(),
        });
    }

    pub fn worker_removed(&self, reason: &str) {
        self.emit(JobEvent::WorkerRemoved {
            worker_id: self.subject_id.clone(),
            reason: reason.to_string(),
        });
    }

    pub fn tool_call_started(&self, tool_name: &str, args_summary: &str) {
        self.emit(JobEvent::ToolCallStarted {
            job_id: self.subject_id.clone(),
            tool_name: tool_name.to_string(),
            args_summary: args_summary.to_string(),
        });
    }

    pub fn tool_call_completed(&self, tool_name: &str, success: bool, duration_ms: u64) {
        self.emit(JobEvent::ToolCallCompleted {
            job_id: self.subject_id.clone(),
            tool_name: tool_name.to_string(),
            success,
            duration_ms,
        });
    }

    pub fn error(&self, context: &str, message: &str) {
        self.emit(JobEvent::Error {
            subject_id: self.subject_id.clone(),
            context: context.to_string(),
            message: message.to_string(),
        });
    }

    pub fn warning(&self, context: &str, message: &str) {
        self.emit(JobEvent::Warning {
            subject_id: self.subject_id.clone(),
            context: context.to_string(),
            message: message.to_string(),
        });
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_event_bus_creation() {
        let bus = EventBus::new(100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(100);
        let _rx1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.emit(JobEvent::JobQueued {
            job_id: "test-123".to_string(),
            job_type: "prompt".to_string(),
            priority: 3,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.subject_id(), "test-123");
        assert_eq!(event.event_type(), "JobQueued");
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers() {
        let bus = EventBus::new(100);
        // This should not panic even with no subscribers
        bus.emit(JobEvent::JobQueued {
            job_id: "test-123".to_string(),
            job_type: "prompt".to_string(),
            priority: 3,
        });
    }

    #[tokio::test]
    async fn test_event_emitter() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("job-456");

        emitter.job_queued("tool", 2);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.subject_id(), "job-456");
        match event {
            JobEvent::JobQueued { job_type, priority, .. } => {
                assert_eq!(job_type, "tool");
                assert_eq!(priority, 2);
            }
            _ => panic!("Expected JobQueued event"),
        }
    }

    #[tokio::test]
    async fn test_event_emitter_convenience_methods() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("job-789");

        emitter.job_started("w-1");
        emitter.tool_call_started("file_get", "path: /foo");
        emitter.tool_call_completed("file_get", true, 50);
        emitter.job_completed(1000, 100, 50);
        emitter.job_retry(1, 3);
        emitter.job_waiting_input();

        // Verify we received 6 events
        for _ in 0..6 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.subject_id(), "job-789");
        }

        // No more events
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(JobEvent::JobQueued {
            job_id: "test".to_string(),
            job_type: "prompt".to_string(),
            priority: 3,
        });

        // Both subscribers should receive the event
        let event1 = rx1.recv().await.unwrap();
        let event2 = rx2.recv().await.unwrap();
        assert_eq!(event1.subject_id(), "test");
        assert_eq!(event2.subject_id(), "test");
    }

    #[tokio::test]
    async fn test_worker_lifecycle_emitter() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("w-2");

        emitter.worker_spawned();
        emitter.worker_removed("unhealthy");

        let spawned = rx.recv().await.unwrap();
        assert!(matches!(spawned, JobEvent::WorkerSpawned { .. }));
        let removed = rx.recv().await.unwrap();
        match removed {
            JobEvent::WorkerRemoved { worker_id, reason } => {
                assert_eq!(worker_id, "w-2");
                assert_eq!(reason, "unhealthy");
            }
            _ => panic!("Expected WorkerRemoved event"),
        }
    }
}
