//! Worker domain type

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use taskstore::{IndexValue, Record, now_ms};

use super::id::generate_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    #[default]
    Idle,
    Busy,
    Error,
    Offline,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Idle => write!(f, "idle"),
            WorkerStatus::Busy => write!(f, "busy"),
            WorkerStatus::Error => write!(f, "error"),
            WorkerStatus::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub name: String,
    /// Generator identifier this worker is bound to, e.g. `"openai:gpt-4o"`.
    pub worker_type: String,
    pub status: WorkerStatus,
    pub current_job_id: Option<String>,
    pub active_jobs: u32,
    pub max_concurrency: u32,
    pub last_heartbeat: i64,
    pub total_jobs_processed: u64,
    pub total_tokens_used: u64,
    pub consecutive_failures: u32,
    pub created_at: i64,
}

impl Worker {
    pub fn new(worker_type: impl Into<String>) -> Self {
        let worker_type = worker_type.into();
        let now = now_ms();
        Self {
            id: generate_id("worker", &worker_type),
            name: worker_type.clone(),
            worker_type,
            status: WorkerStatus::Idle,
            current_job_id: None,
            active_jobs: 0,
            max_concurrency: 1,
            last_heartbeat: now,
            total_jobs_processed: 0,
            total_tokens_used: 0,
            consecutive_failures: 0,
            created_at: now,
        }
    }

    pub fn is_healthy(&self, unhealthy_threshold_ms: i64) -> bool {
        now_ms() - self.last_heartbeat < unhealthy_threshold_ms
    }

    pub fn is_available(&self) -> bool {
        matches!(self.status, WorkerStatus::Idle) && self.active_jobs < self.max_concurrency
    }
}

impl Record for Worker {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.last_heartbeat
    }

    fn collection_name() -> &'static str {
        "workers"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("last_heartbeat".to_string(), IndexValue::Int(self.last_heartbeat));
        fields
    }
}
