//! Job domain type
//!
//! A unit of durable work with identity, priority, dependencies, status,
//! and a typed payload. Persisted through [`taskstore::Store`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskstore::{IndexValue, Record, now_ms};

use super::id::generate_id;

/// What a job's payload asks the worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    #[default]
    Prompt,
    Tool,
    Composite,
    Workflow,
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Prompt => write!(f, "prompt"),
            JobType::Tool => write!(f, "tool"),
            JobType::Composite => write!(f, "composite"),
            JobType::Workflow => write!(f, "workflow"),
        }
    }
}

/// How a composite job's children relate to one another. Meaningless for
/// non-composite jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
    Batch,
}

/// Lifecycle status of a job. Terminal states are `Completed`, `Failed`,
/// `Cancelled` — absorbing, per the invariant in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-type job payload. Opaque to the queue and resolver; interpreted by
/// the worker and, for `tool`, the tool-call dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    Prompt {
        prompt: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        system_prompt: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<Value>,
    },
    Tool {
        tool_name: String,
        tool_args: Value,
    },
    Composite {
        child_jobs: Vec<String>,
    },
}

/// Parameters a caller supplies to submit a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    pub name: String,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub parent_job_id: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    pub payload: JobPayload,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub scheduled_for: Option<i64>,
    #[serde(default)]
    pub cron_expression: Option<String>,
}

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// A unit of durable work. See §3 for the full invariant list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub job_type: JobType,
    pub priority: i32,
    pub parent_job_id: Option<String>,
    pub dependencies: Vec<String>,
    pub execution_mode: ExecutionMode,
    pub payload: JobPayload,
    pub status: JobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub scheduled_for: Option<i64>,
    pub cron_expression: Option<String>,
    pub worker_id: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub last_error: Option<String>,
}

impl Job {
    /// Build a new job in `Pending` status from a submission. Does not
    /// decide `Queued` vs `Pending` — that's the queue's job, since it
    /// depends on whether dependencies already resolved.
    pub fn from_submission(submission: JobSubmission) -> Self {
        let id = generate_id("job", &submission.name);
        let now = now_ms();
        Self {
            id,
            name: submission.name,
            job_type: submission.job_type,
            priority: submission.priority.unwrap_or(super::priority::DEFAULT_PRIORITY),
            parent_job_id: submission.parent_job_id,
            dependencies: submission.dependencies,
            execution_mode: submission.execution_mode,
            payload: submission.payload,
            status: JobStatus::Pending,
            retry_count: 0,
            max_retries: submission.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            timeout_ms: submission.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            scheduled_for: submission.scheduled_for,
            cron_expression: submission.cron_expression,
            worker_id: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            last_error: None,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.job_type, JobType::Composite)
    }

    /// Every dependency id this job references, for cycle detection and
    /// dependency-chain inspection.
    pub fn dependency_set(&self) -> HashSet<&str> {
        self.dependencies.iter().map(String::as_str).collect()
    }
}

impl Record for Job {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.completed_at.or(self.started_at).unwrap_or(self.created_at)
    }

    fn collection_name() -> &'static str {
        "jobs"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("job_type".to_string(), IndexValue::String(self.job_type.to_string()));
        fields.insert("priority".to_string(), IndexValue::Int(self.priority as i64));
        fields.insert("created_at".to_string(), IndexValue::Int(self.created_at));
        if let Some(parent) = &self.parent_job_id {
            fields.insert("parent_job_id".to_string(), IndexValue::String(parent.clone()));
        }
        if let Some(worker) = &self.worker_id {
            fields.insert("worker_id".to_string(), IndexValue::String(worker.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(name: &str, deps: Vec<String>) -> JobSubmission {
        JobSubmission {
            name: name.to_string(),
            job_type: JobType::Prompt,
            priority: None,
            parent_job_id: None,
            dependencies: deps,
            execution_mode: ExecutionMode::Sequential,
            payload: JobPayload::Prompt {
                prompt: "hello".to_string(),
                system_prompt: None,
                context: None,
            },
            max_retries: None,
            timeout_ms: None,
            scheduled_for: None,
            cron_expression: None,
        }
    }

    #[test]
    fn from_submission_defaults() {
        let job = Job::from_submission(submission("A", vec![]));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, 5);
        assert_eq!(job.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(job.retry_count, 0);
        assert!(job.started_at.is_none());
    }

    #[test]
    fn terminal_states_are_absorbing() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn indexed_fields_include_status_and_priority() {
        let job = Job::from_submission(submission("A", vec!["dep1".to_string()]));
        let fields = job.indexed_fields();
        assert_eq!(fields.get("status"), Some(&IndexValue::String("pending".to_string())));
        assert_eq!(fields.get("priority"), Some(&IndexValue::Int(5)));
    }
}
