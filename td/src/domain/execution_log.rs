//! ExecutionLog domain type — audit trail for tool executions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskstore::{IndexValue, Record, now_ms};

use super::id::generate_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: String,
    pub task_id: Option<String>,
    pub action: String,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<u64>,
    pub created_at: i64,
}

impl ExecutionLog {
    pub fn new(action: impl Into<String>, task_id: Option<String>) -> Self {
        let action = action.into();
        Self {
            id: generate_id("exec", &action),
            task_id,
            action,
            input: None,
            output: None,
            exit_code: None,
            duration_ms: None,
            created_at: now_ms(),
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

impl Record for ExecutionLog {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "execution_logs"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        if let Some(task_id) = &self.task_id {
            fields.insert("task_id".to_string(), IndexValue::String(task_id.clone()));
        }
        fields.insert("action".to_string(), IndexValue::String(self.action.clone()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let log = ExecutionLog::new("terminal_execute", Some("t1".to_string()))
            .with_input(serde_json::json!({"command": "ls"}))
            .with_exit_code(0)
            .with_duration(12);

        assert_eq!(log.exit_code, Some(0));
        assert_eq!(log.duration_ms, Some(12));
        assert!(log.input.is_some());
    }
}
