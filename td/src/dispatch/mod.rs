//! Tool-Call Dispatcher: parses one LLM reply into `{toolCalls: ToolCall[]}`,
//! runs each call in order through the [`handlers::ToolRegistry`], and
//! aggregates results. Replaces a monolithic per-tool `match` with a loop
//! over a name-keyed table (see [`handlers::ToolRegistry::standard`]).

mod context;
mod error;
mod handlers;
pub mod routing;

pub use context::{DispatchContext, LastGeneratorCall};
pub use error::DispatchError;
pub use handlers::{ToolHandler, ToolRegistry};
pub use routing::Target;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::{ExecutionLog, ToolCall, ToolTask};

const PARSE_FAILURE_MESSAGE: &str = "Failed to parse structured response";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultEntry {
    pub tool_id: String,
    #[serde(rename = "type")]
    pub tool_type: String,
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub duration: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,
    pub chat_content: String,
    pub tool_results: Vec<ToolResultEntry>,
    pub files_created: Vec<String>,
    pub files_modified: Vec<String>,
    pub errors: Vec<String>,
    pub execution_time: u64,
}

impl DispatchResult {
    fn parse_failure() -> Self {
        Self {
            success: false,
            chat_content: PARSE_FAILURE_MESSAGE.to_string(),
            tool_results: Vec::new(),
            files_created: Vec::new(),
            files_modified: Vec::new(),
            errors: vec![PARSE_FAILURE_MESSAGE.to_string()],
            execution_time: 0,
        }
    }

    fn empty_ok() -> Self {
        Self {
            success: true,
            chat_content: String::new(),
            tool_results: Vec::new(),
            files_created: Vec::new(),
            files_modified: Vec::new(),
            errors: Vec::new(),
            execution_time: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReplyBody {
    #[serde(default, rename = "toolCalls")]
    tool_calls: Vec<ToolCall>,
}

/// Strip an optional triple-backtick fence (``` or ```json) around a reply
/// body. Anything outside the fenced or bare JSON object is rejected by the
/// subsequent parse, not stripped here.
fn strip_fence(body: &str) -> &str {
    let trimmed = body.trim_start();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let after_open = after_open.strip_prefix("json").unwrap_or(after_open);
    let after_open = after_open.trim_start_matches(['\n', '\r']);
    match after_open.rfind("```") {
        Some(idx) => after_open[..idx].trim_end(),
        None => after_open,
    }
}

pub struct ToolCallDispatcher {
    registry: ToolRegistry,
}

impl ToolCallDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn standard() -> Self {
        Self::new(ToolRegistry::standard())
    }

    /// Parse and execute one LLM reply against `ctx`, in array order.
    pub async fn dispatch(&self, ctx: &DispatchContext, reply: &str) -> DispatchResult {
        let start = Instant::now();
        let body = strip_fence(reply);

        let parsed: ReplyBody = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "failed to parse tool-call reply");
                return DispatchResult::parse_failure();
            }
        };

        if parsed.tool_calls.is_empty() {
            return DispatchResult::empty_ok();
        }

        let mut result = DispatchResult::empty_ok();
        let mut chat_parts = Vec::new();

        for call in &parsed.tool_calls {
            let mut task = ToolTask::start(call, &ctx.job_id);
            let call_start = Instant::now();

            let outcome = match self.registry.get(&call.tool_type) {
                None => Err(DispatchError::UnknownTool(call.tool_type.clone())),
                Some(handler) => match handler.validate(&params_value(call)) {
                    Err(e) => Err(e),
                    Ok(()) => handler.execute(ctx, &params_value(call)).await,
                },
            };

            let duration = call_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(value) => {
                    task.complete(value.clone());
                    if call.tool_type == "send_chat" {
                        if let Some(content) = value.get("content").and_then(Value::as_str) {
                            chat_parts.push(content.to_string());
                        }
                    }
                    if call.tool_type == "file_put" {
                        if let Some(path) = value.get("path").and_then(Value::as_str) {
                            let created = value.get("created").and_then(Value::as_bool).unwrap_or(false);
                            if created {
                                result.files_created.push(path.to_string());
                            } else {
                                result.files_modified.push(path.to_string());
                            }
                        }
                    }
                    result.tool_results.push(ToolResultEntry {
                        tool_id: call.id.clone(),
                        tool_type: call.tool_type.clone(),
                        success: true,
                        result: Some(value),
                        error: None,
                        duration,
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    task.fail(message.clone());
                    result.errors.push(message.clone());
                    result.success = false;
                    result.tool_results.push(ToolResultEntry {
                        tool_id: call.id.clone(),
                        tool_type: call.tool_type.clone(),
                        success: false,
                        result: None,
                        error: Some(message),
                        duration,
                    });
                }
            }

            self.persist_trace(ctx, &task);
        }

        result.chat_content = chat_parts.join("\n\n");
        result.execution_time = start.elapsed().as_millis() as u64;
        result
    }

    fn persist_trace(&self, ctx: &DispatchContext, task: &ToolTask) {
        let mut store = ctx.lock_store();
        if let Err(e) = store.create(task.clone()) {
            warn!(error = %e, task_id = %task.id, "failed to persist tool task");
        }

        let log = ExecutionLog::new(task.task_type.clone(), Some(task.id.clone()))
            .with_input(task.payload.clone())
            .with_duration(task.executed_at.map(|t| (t - task.created_at).max(0) as u64).unwrap_or(0));
        let log = match &task.result {
            Some(output) => log.with_output(output.clone()),
            None => log,
        };
        if let Err(e) = store.create(log) {
            warn!(error = %e, task_id = %task.id, "failed to persist execution log");
        }
    }
}

fn params_value(call: &ToolCall) -> Value {
    serde_json::to_value(&call.parameters).unwrap_or(Value::Null)
}
