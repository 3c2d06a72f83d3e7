//! Tool registry: one named, validated, executable entry per tool. Replaces
//! a per-tool-name branch with a table the dispatcher loops over.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use super::context::DispatchContext;
use super::error::DispatchError;
use super::routing::{self, Target};
use crate::domain::{ExecutionMode, JobPayload, JobSubmission, JobType};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Validate parameters before execution. Failing here does not abort
    /// the rest of a dispatch's tool calls.
    fn validate(&self, params: &Value) -> Result<(), DispatchError>;

    async fn execute(&self, ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError>;
}

pub struct ToolRegistry {
    handlers: HashMap<String, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Registry wired with the full in-scope tool catalog.
    pub fn standard() -> Self {
        let mut registry = Self { handlers: HashMap::new() };
        registry.register("send_chat", SendChatHandler);
        registry.register("file_get", FileGetHandler);
        registry.register("file_put", FilePutHandler);
        registry.register("file_ingest", FileIngestHandler);
        registry.register("terminal_execute", TerminalExecuteHandler);
        registry.register("editor_load", EditorLoadHandler);
        registry.register("api_call", ApiCallHandler);
        registry.register("debug_echo", DebugEchoHandler);
        registry.register("sms_send", SmsSendHandler);
        registry.register("sms_list", SmsListHandler);
        registry.register("call_make", CallMakeHandler);
        registry.register("call_list", CallListHandler);
        registry.register("queue_create", QueueCreateHandler);
        registry.register("queue_batch", QueueBatchHandler);
        registry.register("queue_list", QueueListHandler);
        registry.register("queue_start", QueueStartHandler);

        for name in LEAF_ADAPTER_FAMILIES {
            registry.register(name, LeafAdapterHandler { family: name });
        }
        registry
    }

    pub fn empty() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(&mut self, name: &str, handler: impl ToolHandler + 'static) {
        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.handlers.get(name).map(|h| h.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

/// Contract-only leaf families: the dispatcher owns routing and
/// parameter-presence validation; the actual provider call is an external
/// collaborator's concern.
const LEAF_ADAPTER_FAMILIES: &[&str] = &[
    "search",
    "web_search",
    "google_search",
    "duckduckgo_search",
    "browser_scrape",
    "tavily_search",
    "perplexity_search",
    "gmail_send",
    "gmail_list",
    "drive_list",
    "drive_get",
    "docs_get",
    "docs_update",
    "sheets_get",
    "sheets_update",
    "calendar_list",
    "calendar_create",
    "tasks_list",
    "tasks_create",
    "contacts_list",
    "github_repos",
    "github_contents",
    "github_file_read",
    "github_code_search",
    "github_issues",
    "github_pulls",
    "github_commits",
    "github_user",
    "browserbase_load",
    "browserbase_screenshot",
    "browserbase_action",
];

struct SendChatHandler;

#[async_trait]
impl ToolHandler for SendChatHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        require_str(params, "content")?;
        Ok(())
    }

    async fn execute(&self, _ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let content = require_str(params, "content")?;
        Ok(serde_json::json!({"content": content}))
    }
}

struct FileGetHandler;

#[async_trait]
impl ToolHandler for FileGetHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        routing::parse(require_str(params, "path")?)?;
        Ok(())
    }

    async fn execute(&self, ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let path = require_str(params, "path")?;
        match routing::parse(path)? {
            Target::Server(rest) => {
                let resolved = ctx.resolve_server_path(&rest)?;
                let content = std::fs::read_to_string(&resolved)?;
                Ok(serde_json::json!({"path": path, "content": content}))
            }
            Target::Client(rest) => ctx.client_router()?.read_file(None, &rest).await.map_err(DispatchError::from),
            Target::Editor { buffer, .. } => Ok(serde_json::json!({"buffer": buffer, "content": null})),
        }
    }
}

struct FilePutHandler;

#[async_trait]
impl ToolHandler for FilePutHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        routing::parse(require_str(params, "path")?)?;
        require_str(params, "content")?;
        Ok(())
    }

    async fn execute(&self, ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let path = require_str(params, "path")?;
        let content = require_str(params, "content")?;
        match routing::parse(path)? {
            Target::Server(rest) => {
                let resolved = ctx.resolve_server_path(&rest)?;
                let created = !resolved.exists();
                if let Some(parent) = resolved.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&resolved, content)?;
                Ok(serde_json::json!({"path": path, "written": true, "created": created}))
            }
            Target::Client(rest) => {
                let mut result = ctx.client_router()?.write_file(None, &rest, content).await.map_err(DispatchError::from)?;
                if let Some(obj) = result.as_object_mut() {
                    obj.entry("created").or_insert(serde_json::Value::Bool(false));
                }
                Ok(result)
            }
            Target::Editor { buffer, .. } => Ok(serde_json::json!({"buffer": buffer, "written": true})),
        }
    }
}

struct FileIngestHandler;

#[async_trait]
impl ToolHandler for FileIngestHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        routing::parse(require_str(params, "path")?)?;
        Ok(())
    }

    async fn execute(&self, _ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let path = require_str(params, "path")?;
        // Retrieval-index ingest is an external collaborator; this records
        // the request for it.
        Ok(serde_json::json!({"path": path, "ingested": true}))
    }
}

struct TerminalExecuteHandler;

const DEFAULT_TERMINAL_TIMEOUT_SECS: u64 = 30;

#[async_trait]
impl ToolHandler for TerminalExecuteHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        require_str(params, "command")?;
        if let Some(cwd) = params.get("cwd").and_then(Value::as_str) {
            routing::parse(cwd)?;
        }
        Ok(())
    }

    async fn execute(&self, ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let command = require_str(params, "command")?;
        let timeout_secs = params.get("timeout").and_then(Value::as_u64).unwrap_or(DEFAULT_TERMINAL_TIMEOUT_SECS);
        let cwd = params.get("cwd").and_then(Value::as_str).unwrap_or("server:.");

        match routing::parse(cwd)? {
            Target::Client(rest) => ctx
                .client_router()?
                .execute_terminal(None, &format!("cd {rest} && {command}"))
                .await
                .map_err(DispatchError::from),
            Target::Server(rest) | Target::Editor { buffer: rest, .. } => {
                let cwd_path = ctx.resolve_server_path(&rest)?;
                let output = tokio::time::timeout(
                    std::time::Duration::from_secs(timeout_secs),
                    tokio::process::Command::new("sh").arg("-c").arg(command).current_dir(&cwd_path).output(),
                )
                .await
                .map_err(|_| DispatchError::InvalidParams(format!("terminal_execute timed out after {timeout_secs}s")))??;

                Ok(serde_json::json!({
                    "exitCode": output.status.code(),
                    "stdout": String::from_utf8_lossy(&output.stdout),
                    "stderr": String::from_utf8_lossy(&output.stderr),
                }))
            }
        }
    }
}

struct EditorLoadHandler;

#[async_trait]
impl ToolHandler for EditorLoadHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        let path = require_str(params, "path")?;
        match routing::parse(path)? {
            Target::Editor { .. } => Ok(()),
            _ => Err(DispatchError::InvalidParams("editor_load requires an editor: target".to_string())),
        }
    }

    async fn execute(&self, ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let path = require_str(params, "path")?;
        let Target::Editor { buffer, source } = routing::parse(path)? else {
            unreachable!("validated above");
        };
        let content = match source.as_deref() {
            Some(Target::Server(rest)) => Some(std::fs::read_to_string(ctx.resolve_server_path(rest)?)?),
            Some(Target::Client(rest)) => {
                let result = ctx.client_router()?.read_file(None, rest).await?;
                result.get("content").and_then(Value::as_str).map(str::to_string)
            }
            _ => None,
        };
        Ok(serde_json::json!({"buffer": buffer, "content": content}))
    }
}

struct ApiCallHandler;

const VALID_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

#[async_trait]
impl ToolHandler for ApiCallHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        require_str(params, "url")?;
        let method = require_str(params, "method")?;
        if !VALID_METHODS.contains(&method.to_uppercase().as_str()) {
            return Err(DispatchError::InvalidParams(format!("unsupported method: {method}")));
        }
        Ok(())
    }

    async fn execute(&self, _ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let url = require_str(params, "url")?;
        let method = require_str(params, "method")?.to_uppercase();
        let body = if matches!(method.as_str(), "GET" | "HEAD") { None } else { params.get("body").cloned() };
        Ok(serde_json::json!({"url": url, "method": method, "body": body, "dispatched": true}))
    }
}

struct DebugEchoHandler;

#[async_trait]
impl ToolHandler for DebugEchoHandler {
    fn validate(&self, _params: &Value) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn execute(&self, ctx: &DispatchContext, _params: &Value) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({
            "systemPrompt": ctx.last_call.system_prompt,
            "prompt": ctx.last_call.prompt,
            "reply": ctx.last_call.reply,
        }))
    }
}

struct SmsSendHandler;

fn is_e164(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some('+')) && chars.clone().count() >= 1 && chars.clone().count() <= 15 && chars.all(|c| c.is_ascii_digit())
}

#[async_trait]
impl ToolHandler for SmsSendHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        let to = require_str(params, "to")?;
        if !is_e164(to) {
            return Err(DispatchError::InvalidParams(format!("\"to\" is not E.164: {to}")));
        }
        let body = require_str(params, "body")?;
        if body.is_empty() || body.chars().count() > 1600 {
            return Err(DispatchError::InvalidParams("\"body\" must be 1..1600 characters".to_string()));
        }
        Ok(())
    }

    async fn execute(&self, _ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let to = require_str(params, "to")?;
        Ok(serde_json::json!({"to": to, "sent": true}))
    }
}

struct SmsListHandler;

#[async_trait]
impl ToolHandler for SmsListHandler {
    fn validate(&self, _params: &Value) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn execute(&self, _ctx: &DispatchContext, _params: &Value) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({"messages": []}))
    }
}

struct CallMakeHandler;

#[async_trait]
impl ToolHandler for CallMakeHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        let to = require_str(params, "to")?;
        if !is_e164(to) {
            return Err(DispatchError::InvalidParams(format!("\"to\" is not E.164: {to}")));
        }
        Ok(())
    }

    async fn execute(&self, _ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let to = require_str(params, "to")?;
        Ok(serde_json::json!({"to": to, "dialed": true}))
    }
}

struct CallListHandler;

#[async_trait]
impl ToolHandler for CallListHandler {
    fn validate(&self, _params: &Value) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn execute(&self, _ctx: &DispatchContext, _params: &Value) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({"calls": []}))
    }
}

fn require_queue<'a>(ctx: &'a DispatchContext) -> Result<&'a crate::queue::JobQueue, DispatchError> {
    ctx.queue.as_deref().ok_or_else(|| DispatchError::InvalidParams("no job queue bound to this dispatch".to_string()))
}

fn job_submission_from_params(params: &Value) -> Result<JobSubmission, DispatchError> {
    let name = require_str(params, "name")?.to_string();
    let prompt = require_str(params, "prompt")?.to_string();
    let priority = params.get("priority").and_then(Value::as_i64).map(|p| p as i32);
    let dependencies = params
        .get("dependencies")
        .and_then(Value::as_array)
        .map(|deps| deps.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    Ok(JobSubmission {
        name,
        job_type: JobType::Prompt,
        priority,
        parent_job_id: None,
        dependencies,
        execution_mode: ExecutionMode::Sequential,
        payload: JobPayload::Prompt { prompt, system_prompt: None, context: None },
        max_retries: None,
        timeout_ms: None,
        scheduled_for: None,
        cron_expression: None,
    })
}

struct QueueCreateHandler;

#[async_trait]
impl ToolHandler for QueueCreateHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        require_str(params, "name")?;
        require_str(params, "prompt")?;
        Ok(())
    }

    async fn execute(&self, ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let queue = require_queue(ctx)?;
        let submission = job_submission_from_params(params)?;
        let job = queue.submit(submission).map_err(|e| DispatchError::InvalidParams(e.to_string()))?;
        Ok(serde_json::json!({"jobId": job.id, "status": job.status.to_string()}))
    }
}

struct QueueBatchHandler;

#[async_trait]
impl ToolHandler for QueueBatchHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        let jobs = params
            .get("jobs")
            .and_then(Value::as_array)
            .ok_or_else(|| DispatchError::InvalidParams("\"jobs\" must be an array".to_string()))?;
        for job in jobs {
            require_str(job, "name")?;
            require_str(job, "prompt")?;
        }
        Ok(())
    }

    async fn execute(&self, ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let queue = require_queue(ctx)?;
        let jobs = params.get("jobs").and_then(Value::as_array).cloned().unwrap_or_default();
        let submissions: Vec<JobSubmission> = jobs.iter().map(job_submission_from_params).collect::<Result<_, _>>()?;
        let results = queue.submit_batch(submissions);
        let job_ids: Vec<Value> = results
            .into_iter()
            .map(|r| match r {
                Ok(job) => serde_json::json!({"jobId": job.id, "status": job.status.to_string()}),
                Err(e) => serde_json::json!({"error": e.to_string()}),
            })
            .collect();
        Ok(serde_json::json!({"jobs": job_ids}))
    }
}

struct QueueListHandler;

#[async_trait]
impl ToolHandler for QueueListHandler {
    fn validate(&self, _params: &Value) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn execute(&self, ctx: &DispatchContext, _params: &Value) -> Result<Value, DispatchError> {
        let store = ctx.lock_store();
        let jobs: Vec<crate::domain::Job> = store.list(&[])?;
        let summary: Vec<Value> = jobs
            .into_iter()
            .map(|j| serde_json::json!({"jobId": j.id, "name": j.name, "status": j.status.to_string()}))
            .collect();
        Ok(serde_json::json!({"jobs": summary}))
    }
}

struct QueueStartHandler;

#[async_trait]
impl ToolHandler for QueueStartHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        require_str(params, "jobId")?;
        Ok(())
    }

    async fn execute(&self, ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        let queue = require_queue(ctx)?;
        let job_id = require_str(params, "jobId")?;
        let job = queue.resume(job_id, None).map_err(|e| DispatchError::InvalidParams(e.to_string()))?;
        Ok(serde_json::json!({"jobId": job.id, "status": job.status.to_string()}))
    }
}

/// Thin contract-only adapter for a leaf family (search providers, Google
/// Workspace, GitHub, Browserbase). Validates that parameters are present
/// and shaped as an object; actual provider calls are an external
/// collaborator.
struct LeafAdapterHandler {
    family: &'static str,
}

#[async_trait]
impl ToolHandler for LeafAdapterHandler {
    fn validate(&self, params: &Value) -> Result<(), DispatchError> {
        if !params.is_object() {
            return Err(DispatchError::InvalidParams(format!("{} requires an object of parameters", self.family)));
        }
        Ok(())
    }

    async fn execute(&self, _ctx: &DispatchContext, params: &Value) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({"family": self.family, "delegated": true, "parameters": params}))
    }
}

fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, DispatchError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DispatchError::InvalidParams(format!("missing or empty \"{field}\"")))
}
