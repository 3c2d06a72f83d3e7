//! Event types for job orchestration activity streaming
//!
//! These events represent all observable activity in the scheduler:
//! - Job lifecycle (queued, started, completed, failed, retried)
//! - Worker pool lifecycle (spawned, removed)
//! - Tool-call dispatch (started, completed)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Core event enum - the vocabulary of the scheduler's activity
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    /// A job has been accepted and is eligible for dispatch (or waiting on deps)
    JobQueued {
        job_id: String,
        job_type: String,
        priority: i32,
    },
    /// A job has been claimed by a worker and begun execution
    JobStarted { job_id: String, worker_id: String },
    /// A job finished successfully
    JobCompleted {
        job_id: String,
        duration_ms: u64,
        input_tokens: u64,
        output_tokens: u64,
    },
    /// A job reached a terminal failure (retries exhausted or dependency failed)
    JobFailed {
        job_id: String,
        error: String,
        retry_count: u32,
    },
    /// A job failed but is being returned to the queue for another attempt
    JobRetry {
        job_id: String,
        retry_count: u32,
        max_retries: u32,
    },
    /// A job is parked pending operator input
    JobWaitingInput { job_id: String },

    /// A new worker joined the pool
    WorkerSpawned { worker_id: String },
    /// A worker was removed from the pool
    WorkerRemoved { worker_id: String, reason: String },

    /// A tool call has started
    ToolCallStarted {
        job_id: String,
        tool_name: String,
        args_summary: String,
    },
    /// A tool call has completed
    ToolCallCompleted {
        job_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
    },

    /// An error occurred
    Error { subject_id: String, context: String, message: String },
    /// A warning occurred
    Warning { subject_id: String, context: String, message: String },
}

impl JobEvent {
    /// The id this event is primarily about: a job id for job/tool events,
    /// a worker id for pool lifecycle events.
    pub fn subject_id(&self) -> &str {
        match self {
            JobEvent::JobQueued { job_id, .. }
            | JobEvent::JobStarted { job_id, .. }
            | JobEvent::JobCompleted { job_id, .. }
            | JobEvent::JobFailed { job_id, .. }
            | JobEvent::JobRetry { job_id, .. }
            | JobEvent::JobWaitingInput { job_id }
            | JobEvent::ToolCallStarted { job_id, .. }
            | JobEvent::ToolCallCompleted { job_id, .. } => job_id,
            JobEvent::WorkerSpawned { worker_id } | JobEvent::WorkerRemoved { worker_id, .. } => worker_id,
            JobEvent::Error { subject_id, .. } | JobEvent::Warning { subject_id, .. } => subject_id,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            JobEvent::JobQueued { .. } => "JobQueued",
            JobEvent::JobStarted { .. } => "JobStarted",
            JobEvent::JobCompleted { .. } => "JobCompleted",
            JobEvent::JobFailed { .. } => "JobFailed",
            JobEvent::JobRetry { .. } => "JobRetry",
            JobEvent::JobWaitingInput { .. } => "JobWaitingInput",
            JobEvent::WorkerSpawned { .. } => "WorkerSpawned",
            JobEvent::WorkerRemoved { .. } => "WorkerRemoved",
            JobEvent::ToolCallStarted { .. } => "ToolCallStarted",
            JobEvent::ToolCallCompleted { .. } => "ToolCallCompleted",
            JobEvent::Error { .. } => "Error",
            JobEvent::Warning { .. } => "Warning",
        }
    }
}

/// A timestamped event log entry for file persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Timestamp of the event
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// The event
    pub event: JobEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: JobEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
