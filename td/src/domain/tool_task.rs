//! ToolTask domain type — the persisted trace of one parsed ToolCall.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskstore::{IndexValue, Record, now_ms};

/// A single tool invocation parsed out of an LLM reply. Transient — lives
/// only through one dispatch; its persisted trace is a [`ToolTask`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub tool_type: String,
    pub operation: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolTaskStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for ToolTaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolTaskStatus::Running => write!(f, "running"),
            ToolTaskStatus::Completed => write!(f, "completed"),
            ToolTaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Persisted trace of one [`ToolCall`]. State machine: `Running ->
/// (Completed | Failed)`, no re-entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTask {
    pub id: String,
    pub message_id: String,
    pub task_type: String,
    pub payload: Value,
    pub status: ToolTaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub executed_at: Option<i64>,
    pub created_at: i64,
}

impl ToolTask {
    pub fn start(call: &ToolCall, message_id: impl Into<String>) -> Self {
        Self {
            id: call.id.clone(),
            message_id: message_id.into(),
            task_type: call.tool_type.clone(),
            payload: serde_json::to_value(&call.parameters).unwrap_or(Value::Null),
            status: ToolTaskStatus::Running,
            result: None,
            error: None,
            executed_at: None,
            created_at: now_ms(),
        }
    }

    pub fn complete(&mut self, result: Value) {
        self.status = ToolTaskStatus::Completed;
        self.result = Some(result);
        self.executed_at = Some(now_ms());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ToolTaskStatus::Failed;
        self.error = Some(error.into());
        self.executed_at = Some(now_ms());
    }
}

impl Record for ToolTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.executed_at.unwrap_or(self.created_at)
    }

    fn collection_name() -> &'static str {
        "tool_tasks"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("message_id".to_string(), IndexValue::String(self.message_id.clone()));
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("task_type".to_string(), IndexValue::String(self.task_type.clone()));
        fields
    }
}
