//! Domain types for the job orchestration core: Job, JobResult, Worker,
//! ToolCall/ToolTask, ExecutionLog. All implement the `Record` trait for
//! taskstore persistence.

mod execution_log;
mod id;
mod job;
mod job_result;
mod priority;
mod tool_task;
mod worker;

pub use execution_log::ExecutionLog;
pub use id::generate_id;
pub use job::{
    DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS, ExecutionMode, Job, JobPayload, JobStatus, JobSubmission, JobType,
};
pub use job_result::JobResult;
pub use priority::{DEFAULT_PRIORITY, PriorityBand};
pub use tool_task::{ToolCall, ToolTask, ToolTaskStatus};
pub use worker::{Worker, WorkerStatus};

// Re-export taskstore types for convenience, as the teacher's domain
// module does for its own Record-based types.
pub use taskstore::{Filter, FilterOp, IndexValue, Record, Store};
