//! Single-job execution: dispatches a claimed `Job` to the right capability
//! based on its payload. Sits between the [`crate::pool::WorkerPool`] (which
//! owns worker lifecycle) and the [`crate::generator::Generator`] /
//! [`crate::dispatch::ToolCallDispatcher`] (which do the actual work).

use std::path::PathBuf;
use std::sync::Arc;

use taskstore::Store;
use thiserror::Error;

use crate::dispatch::{DispatchContext, LastGeneratorCall, ToolCallDispatcher};
use crate::domain::{Job, JobPayload, JobResult, JobStatus};
use crate::generator::{GenerateRequest, Generator};
use crate::llm::LlmError;
use crate::queue::JobQueue;
use crate::router::ClientRouter;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Generator(#[from] LlmError),

    #[error("job is waiting on unresolved children")]
    WaitingOnChildren,

    #[error("composite job has no children")]
    EmptyComposite,
}

/// A tool-type job's structured-reply prompt demands exactly the
/// `{toolCalls: [...]}` wire shape the dispatcher parses.
fn tool_prompt(tool_name: &str, tool_args: &serde_json::Value) -> String {
    format!(
        "Respond with a single JSON object of the form {{\"toolCalls\": [...]}}. \
         Invoke exactly one tool call: type \"{tool_name}\" with these parameters: {tool_args}. \
         Do not include any text outside the JSON object."
    )
}

pub struct JobExecutor {
    generator: Arc<dyn Generator>,
    dispatcher: Arc<ToolCallDispatcher>,
    store: Arc<std::sync::Mutex<Store>>,
    workspace_dir: PathBuf,
    queue: Option<Arc<JobQueue>>,
    client_router: Option<Arc<ClientRouter>>,
}

impl JobExecutor {
    pub fn new(generator: Arc<dyn Generator>, dispatcher: Arc<ToolCallDispatcher>, store: Arc<std::sync::Mutex<Store>>, workspace_dir: PathBuf) -> Self {
        Self { generator, dispatcher, store, workspace_dir, queue: None, client_router: None }
    }

    pub fn with_queue(mut self, queue: Arc<JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_client_router(mut self, router: Arc<ClientRouter>) -> Self {
        self.client_router = Some(router);
        self
    }

    fn context_for(&self, job: &Job) -> DispatchContext {
        let mut ctx = DispatchContext::new(self.workspace_dir.clone(), job.id.clone(), self.store.clone());
        if let Some(queue) = &self.queue {
            ctx = ctx.with_queue(queue.clone());
        }
        if let Some(router) = &self.client_router {
            ctx = ctx.with_client_router(router.clone());
        }
        ctx
    }

    /// Run `job` to completion or failure. Never panics on a child's
    /// execution error — composite aggregation failures are represented as
    /// `Ok(JobResult::failure(..))`, not propagated as `Err`.
    pub async fn execute(&self, job: &Job) -> Result<JobResult, ExecutionError> {
        match &job.payload {
            JobPayload::Prompt { prompt, system_prompt, context } => self.execute_prompt(job, prompt, system_prompt.as_deref(), context.as_ref()).await,
            JobPayload::Tool { tool_name, tool_args } => self.execute_tool(job, tool_name, tool_args).await,
            JobPayload::Composite { child_jobs } => self.execute_composite(job, child_jobs),
        }
    }

    async fn execute_prompt(
        &self,
        job: &Job,
        prompt: &str,
        system_prompt: Option<&str>,
        context: Option<&serde_json::Value>,
    ) -> Result<JobResult, ExecutionError> {
        let full_prompt = match context {
            Some(ctx) => format!("{prompt}\n\nOperator-supplied context: {ctx}"),
            None => prompt.to_string(),
        };

        let response = self
            .generator
            .generate(GenerateRequest { system_prompt: system_prompt.map(str::to_string), prompt: full_prompt })
            .await?;

        Ok(JobResult::success(
            &job.id,
            serde_json::json!({"text": response.text}),
            0,
            Some(response.input_tokens),
            Some(response.output_tokens),
        ))
    }

    async fn execute_tool(&self, job: &Job, tool_name: &str, tool_args: &serde_json::Value) -> Result<JobResult, ExecutionError> {
        let response = self
            .generator
            .generate(GenerateRequest { system_prompt: None, prompt: tool_prompt(tool_name, tool_args) })
            .await?;

        let ctx = self.context_for(job).with_last_call(LastGeneratorCall {
            system_prompt: None,
            prompt: Some(tool_prompt(tool_name, tool_args)),
            reply: Some(response.text.clone()),
        });

        let dispatch_result = self.dispatcher.dispatch(&ctx, &response.text).await;

        let output = serde_json::to_value(&dispatch_result).unwrap_or(serde_json::Value::Null);
        if dispatch_result.success {
            Ok(JobResult::success(&job.id, output, dispatch_result.execution_time, Some(response.input_tokens), Some(response.output_tokens)))
        } else {
            let error = dispatch_result.errors.join("; ");
            Ok(JobResult::failure(&job.id, if error.is_empty() { "tool dispatch failed".to_string() } else { error }, dispatch_result.execution_time))
        }
    }

    /// Composite jobs never call the Generator: inspect children directly.
    fn execute_composite(&self, job: &Job, child_jobs: &[String]) -> Result<JobResult, ExecutionError> {
        if child_jobs.is_empty() {
            return Err(ExecutionError::EmptyComposite);
        }

        let store = self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let children: Vec<Job> = child_jobs.iter().filter_map(|id| store.get::<Job>(id).ok().flatten()).collect();
        drop(store);

        if let Some(failed) = children.iter().find(|c| c.status == JobStatus::Failed) {
            return Ok(JobResult::failure(&job.id, format!("child job failed: {}", failed.id), 0));
        }

        let completed_count = children.iter().filter(|c| c.status == JobStatus::Completed).count();
        if completed_count < children.len() {
            return Err(ExecutionError::WaitingOnChildren);
        }

        Ok(JobResult::success(
            &job.id,
            serde_json::json!({"childCount": children.len(), "completedCount": completed_count}),
            0,
            None,
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::dispatch::ToolRegistry;
    use crate::domain::{ExecutionMode, JobSubmission, JobType};
    use crate::events::EventBus;

    struct StubGenerator {
        reply: String,
    }

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate(&self, _request: GenerateRequest) -> Result<crate::generator::GenerateResponse, LlmError> {
            Ok(crate::generator::GenerateResponse { text: self.reply.clone(), input_tokens: 5, output_tokens: 5 })
        }
    }

    fn executor(reply: &str) -> (JobExecutor, tempfile::TempDir, tempfile::TempDir) {
        let workspace = tempfile::tempdir().unwrap();
        let (store, store_dir) = Store::open_temp().unwrap();
        let executor = JobExecutor::new(
            Arc::new(StubGenerator { reply: reply.to_string() }),
            Arc::new(ToolCallDispatcher::new(ToolRegistry::standard())),
            Arc::new(std::sync::Mutex::new(store)),
            workspace.path().to_path_buf(),
        );
        (executor, workspace, store_dir)
    }

    fn job(payload: JobPayload) -> Job {
        Job::from_submission(JobSubmission {
            name: "test".to_string(),
            job_type: JobType::Prompt,
            priority: None,
            parent_job_id: None,
            dependencies: vec![],
            execution_mode: ExecutionMode::Sequential,
            payload,
            max_retries: None,
            timeout_ms: None,
            scheduled_for: None,
            cron_expression: None,
        })
    }

    #[tokio::test]
    async fn prompt_job_returns_generator_text() {
        let (executor, _w, _s) = executor("hello world");
        let job = job(JobPayload::Prompt { prompt: "hi".to_string(), system_prompt: None, context: None });
        let result = executor.execute(&job).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output.unwrap()["text"], "hello world");
    }

    #[tokio::test]
    async fn tool_job_parses_structured_reply_into_result() {
        let reply = r#"{"toolCalls": [{"id": "c1", "type": "send_chat", "operation": "respond", "parameters": {"content": "done"}}]}"#;
        let (executor, _w, _s) = executor(reply);
        let job = job(JobPayload::Tool { tool_name: "send_chat".to_string(), tool_args: serde_json::json!({"content": "done"}) });
        let result = executor.execute(&job).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn tool_job_failure_surfaces_dispatch_errors() {
        let reply = "not valid json";
        let (executor, _w, _s) = executor(reply);
        let job = job(JobPayload::Tool { tool_name: "send_chat".to_string(), tool_args: serde_json::json!({}) });
        let result = executor.execute(&job).await.unwrap();
        assert!(!result.success);
    }

    #[test]
    fn composite_job_with_no_children_is_an_error() {
        let (executor, _w, _s) = executor("unused");
        let job = job(JobPayload::Composite { child_jobs: vec![] });
        assert!(matches!(executor.execute_composite(&job, &[]), Err(ExecutionError::EmptyComposite)));
    }

    #[test]
    fn composite_job_waits_until_all_children_terminal() {
        let (executor, _w, _s) = executor("unused");
        let mut store = executor.store.lock().unwrap();
        let child = store.create(job(JobPayload::Prompt { prompt: "p".to_string(), system_prompt: None, context: None })).unwrap();
        drop(store);

        let parent = job(JobPayload::Composite { child_jobs: vec![child.id.clone()] });
        let result = executor.execute_composite(&parent, &[child.id]);
        assert!(matches!(result, Err(ExecutionError::WaitingOnChildren)));
    }

    #[test]
    fn composite_job_aggregates_once_children_complete() {
        let (executor, _w, _s) = executor("unused");
        let mut store = executor.store.lock().unwrap();
        let mut child = store.create(job(JobPayload::Prompt { prompt: "p".to_string(), system_prompt: None, context: None })).unwrap();
        child.status = JobStatus::Completed;
        store.update(child.clone()).unwrap();
        drop(store);

        let parent = job(JobPayload::Composite { child_jobs: vec![child.id.clone()] });
        let result = executor.execute_composite(&parent, &[child.id]).unwrap();
        assert!(result.success);
        assert_eq!(result.output.unwrap()["completedCount"], 1);
    }
}
