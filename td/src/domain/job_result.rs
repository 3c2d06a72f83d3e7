//! JobResult domain type — one-to-one with a terminal Job, never mutated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskstore::{IndexValue, Record, now_ms};

use super::id::generate_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub id: String,
    pub job_id: String,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub duration_ms: u64,
    pub created_at: i64,
}

impl JobResult {
    pub fn success(job_id: impl Into<String>, output: Value, duration_ms: u64, input_tokens: Option<u64>, output_tokens: Option<u64>) -> Self {
        let job_id = job_id.into();
        Self {
            id: generate_id("result", &job_id),
            job_id,
            success: true,
            output: Some(output),
            error: None,
            input_tokens,
            output_tokens,
            duration_ms,
            created_at: now_ms(),
        }
    }

    pub fn failure(job_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        let job_id = job_id.into();
        Self {
            id: generate_id("result", &job_id),
            job_id,
            success: false,
            output: None,
            error: Some(error.into()),
            input_tokens: None,
            output_tokens: None,
            duration_ms,
            created_at: now_ms(),
        }
    }
}

impl Record for JobResult {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "job_results"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("job_id".to_string(), IndexValue::String(self.job_id.clone()));
        fields.insert("success".to_string(), IndexValue::Bool(self.success));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_result_carries_output() {
        let result = JobResult::success("job-1", serde_json::json!({"text": "ok"}), 120, Some(10), Some(20));
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.duration_ms, 120);
    }

    #[test]
    fn failure_result_carries_error_not_output() {
        let result = JobResult::failure("job-1", "boom", 5);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.output.is_none());
    }
}
