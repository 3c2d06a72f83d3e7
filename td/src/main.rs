//! TaskDaemon - agentic job orchestration core
//!
//! CLI entry point: submit jobs and workflows against the durable queue,
//! inspect status, and run the dispatcher loop.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use eyre::{Context, Result};
use tracing::{debug, info};

use taskdaemon::cli::{Cli, Command, OutputFormat};
use taskdaemon::config::Config;
use taskdaemon::dispatch::ToolCallDispatcher;
use taskdaemon::domain::{ExecutionMode, Job, JobPayload, JobResult, JobSubmission, JobType};
use taskdaemon::events::EventBus;
use taskdaemon::generator::LlmGenerator;
use taskdaemon::llm::create_client;
use taskdaemon::queue::JobQueue;
use taskdaemon::worker::JobExecutor;
use taskdaemon::{Filter, IndexValue, Store};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskdaemon")
        .join("logs");
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let level_str = cli_log_level.or(config_log_level);
    let level = match level_str.map(|s| s.to_uppercase()) {
        Some(ref s) if s == "TRACE" => tracing::Level::TRACE,
        Some(ref s) if s == "DEBUG" => tracing::Level::DEBUG,
        Some(ref s) if s == "INFO" => tracing::Level::INFO,
        Some(ref s) if s == "WARN" || s == "WARNING" => tracing::Level::WARN,
        Some(ref s) if s == "ERROR" => tracing::Level::ERROR,
        Some(s) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("taskdaemon.log")).context("Failed to create log file")?;
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command();
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    setup_logging(cli.log_level.as_deref(), None).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, "TaskDaemon config loaded");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Serve) => cmd_serve(&config).await,
        Some(Command::Submit { name, job_type, prompt, system_prompt, tool_name, tool_args, priority, depends_on, max_retries }) => {
            cmd_submit(&config, name, job_type, prompt, system_prompt, tool_name, tool_args, priority, depends_on, max_retries).await
        }
        Some(Command::SubmitWorkflow { name, mode, steps }) => cmd_submit_workflow(&config, name, mode, steps).await,
        Some(Command::Status { job_id, format }) => cmd_status(&config, &job_id, format).await,
        Some(Command::Cancel { job_id }) => cmd_cancel(&config, &job_id).await,
        Some(Command::List { status, limit, format }) => cmd_list(&config, status, limit, format).await,
        Some(Command::Health { format }) => cmd_health(&config, format).await,
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> Result<Arc<std::sync::Mutex<Store>>> {
    let path = PathBuf::from(&config.storage.taskstore_dir);
    if !path.exists() {
        fs::create_dir_all(&path).context("Failed to create TaskStore directory")?;
    }
    let store = Store::open(&path).context("Failed to open TaskStore")?;
    Ok(Arc::new(std::sync::Mutex::new(store)))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_submit(
    config: &Config,
    name: String,
    job_type: taskdaemon::cli::JobTypeArg,
    prompt: Option<String>,
    system_prompt: Option<String>,
    tool_name: Option<String>,
    tool_args: String,
    priority: Option<i32>,
    depends_on: Vec<String>,
    max_retries: Option<u32>,
) -> Result<()> {
    let store = open_store(config)?;
    let events = Arc::new(EventBus::with_default_capacity());
    let queue = JobQueue::new(store, events);

    let job_type: JobType = job_type.into();
    let payload = match job_type {
        JobType::Tool => {
            let tool_name = tool_name.context("--tool-name is required for --type tool")?;
            let tool_args: serde_json::Value = serde_json::from_str(&tool_args).context("--tool-args must be valid JSON")?;
            JobPayload::Tool { tool_name, tool_args }
        }
        _ => JobPayload::Prompt {
            prompt: prompt.context("--prompt is required for --type prompt")?,
            system_prompt,
            context: None,
        },
    };

    let job = queue.submit(JobSubmission {
        name,
        job_type,
        priority,
        parent_job_id: None,
        dependencies: depends_on,
        execution_mode: ExecutionMode::Sequential,
        payload,
        max_retries,
        timeout_ms: None,
        scheduled_for: None,
        cron_expression: None,
    })?;

    println!("{{\"jobId\": \"{}\", \"status\": \"{}\", \"createdAt\": {}}}", job.id, job.status, job.created_at);
    Ok(())
}

async fn cmd_submit_workflow(config: &Config, name: String, mode: taskdaemon::cli::ExecutionModeArg, steps: Vec<String>) -> Result<()> {
    let store = open_store(config)?;
    let events = Arc::new(EventBus::with_default_capacity());
    let queue = JobQueue::new(store, events);

    let submissions: Vec<JobSubmission> = steps
        .into_iter()
        .enumerate()
        .map(|(i, prompt)| JobSubmission {
            name: format!("{name}-step-{}", i + 1),
            job_type: JobType::Prompt,
            priority: None,
            parent_job_id: None,
            dependencies: Vec::new(),
            execution_mode: ExecutionMode::Sequential,
            payload: JobPayload::Prompt { prompt, system_prompt: None, context: None },
            max_retries: None,
            timeout_ms: None,
            scheduled_for: None,
            cron_expression: None,
        })
        .collect();

    let parent = queue.submit_workflow(&name, submissions, mode.into())?;
    println!("{{\"jobId\": \"{}\", \"status\": \"{}\", \"createdAt\": {}}}", parent.id, parent.status, parent.created_at);
    Ok(())
}

async fn cmd_status(config: &Config, job_id: &str, format: OutputFormat) -> Result<()> {
    let store = open_store(config)?;
    let store = store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let Some(job) = store.get::<Job>(job_id)? else {
        eprintln!("Job '{}' not found", job_id);
        return Ok(());
    };
    let results: Vec<JobResult> = store.list(&[Filter::eq("job_id", IndexValue::String(job_id.to_string()))])?;
    let result = results.into_iter().next();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "jobId": job.id,
                "type": job.job_type.to_string(),
                "status": job.status.to_string(),
                "result": result,
                "createdAt": job.created_at,
                "completedAt": job.completed_at,
                "lastError": job.last_error,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Job {}", job.id);
            println!("  name:       {}", job.name);
            println!("  type:       {}", job.job_type);
            println!("  status:     {}", job.status);
            println!("  retries:    {}/{}", job.retry_count, job.max_retries);
            if let Some(error) = &job.last_error {
                println!("  last error: {}", error);
            }
            if let Some(result) = result {
                println!("  success:    {}", result.success);
                println!("  duration:   {}ms", result.duration_ms);
            }
        }
    }
    Ok(())
}

async fn cmd_cancel(config: &Config, job_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let events = Arc::new(EventBus::with_default_capacity());
    let queue = JobQueue::new(store, events);

    match queue.cancel(job_id) {
        Ok(()) => println!("Cancelled job '{}'", job_id),
        Err(e) => eprintln!("Failed to cancel '{}': {}", job_id, e),
    }
    Ok(())
}

async fn cmd_list(config: &Config, status: Option<String>, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let store = open_store(config)?;
    let store = store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let filters = match &status {
        Some(s) => vec![Filter::eq("status", IndexValue::String(s.clone()))],
        None => vec![],
    };
    let mut jobs: Vec<Job> = store.list(&filters)?;
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    if let Some(limit) = limit {
        jobs.truncate(limit);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&jobs)?),
        OutputFormat::Text => {
            if jobs.is_empty() {
                println!("No jobs found{}", status.map(|s| format!(" with status '{}'", s)).unwrap_or_default());
                return Ok(());
            }
            println!("{:<40} {:<10} {:<10} {:<8}", "ID", "STATUS", "TYPE", "PRIORITY");
            println!("{}", "-".repeat(72));
            for job in jobs {
                println!("{:<40} {:<10} {:<10} {:<8}", job.id, job.status, job.job_type, job.priority);
            }
        }
    }
    Ok(())
}

async fn cmd_health(config: &Config, format: OutputFormat) -> Result<()> {
    let store = open_store(config)?;
    let locked = store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let pending = locked.list::<Job>(&[Filter::eq("status", IndexValue::String("pending".to_string()))])?.len();
    let queued = locked.list::<Job>(&[Filter::eq("status", IndexValue::String("queued".to_string()))])?.len();
    let running = locked.list::<Job>(&[Filter::eq("status", IndexValue::String("running".to_string()))])?.len();

    let cutoff = taskstore::now_ms() - 24 * 60 * 60 * 1000;
    let completed24h = locked
        .list::<Job>(&[Filter::eq("status", IndexValue::String("completed".to_string()))])?
        .into_iter()
        .filter(|j| j.completed_at.unwrap_or(0) >= cutoff)
        .count();

    let active = locked.list::<taskdaemon::Worker>(&[Filter::eq("status", IndexValue::String("busy".to_string()))])?.len();
    let idle = locked.list::<taskdaemon::Worker>(&[Filter::eq("status", IndexValue::String("idle".to_string()))])?.len();
    let unhealthy = locked
        .list::<taskdaemon::Worker>(&[])?
        .into_iter()
        .filter(|w| w.status == taskdaemon::WorkerStatus::Offline)
        .count();
    drop(locked);

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "queue": {"pending": pending + queued, "running": running, "completed24h": completed24h},
                "workers": {"active": active, "idle": idle, "unhealthy": unhealthy},
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Queue:   pending={} running={} completed(24h)={}", pending + queued, running, completed24h);
            println!("Workers: active={} idle={} unhealthy={}", active, idle, unhealthy);
        }
    }
    Ok(())
}

/// Start the worker pool and dispatcher loop and run until Ctrl+C.
async fn cmd_serve(config: &Config) -> Result<()> {
    info!("Dispatcher starting...");

    config
        .llm
        .resolve()
        .and_then(|r| r.get_api_key())
        .context("LLM API key not found. Check api-key-env in your config.")?;

    let store = open_store(config)?;
    let events = Arc::new(EventBus::with_default_capacity());
    let queue = Arc::new(JobQueue::new(store.clone(), events.clone()));

    let pool = Arc::new(
        taskdaemon::WorkerPool::new(store.clone(), events.clone(), config.jobs.clone(), &config.llm.model).with_queue(queue.clone()),
    );
    pool.start().await.context("Failed to start worker pool")?;
    info!(min = config.jobs.workers_min, "worker pool started");

    let client = create_client(&config.llm).context("Failed to create LLM client")?;
    let generator = Arc::new(LlmGenerator::new(client, config.llm.max_tokens));
    let dispatcher_tools = Arc::new(ToolCallDispatcher::standard());
    let workspace_dir = std::env::current_dir().context("Failed to get current directory")?;
    let executor = Arc::new(JobExecutor::new(generator, dispatcher_tools, store.clone(), workspace_dir).with_queue(queue.clone()));

    let dispatcher = Arc::new(taskdaemon::JobDispatcher::new(queue, pool.clone(), executor, events, &config.jobs));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let run_handle = tokio::spawn(dispatcher.run(shutdown_rx));

    info!("Dispatcher running. Press Ctrl+C to stop.");
    wait_for_shutdown_signal().await?;
    info!("Shutting down...");
    let _ = shutdown_tx.send(());
    let _ = run_handle.await;
    pool.shutdown().await.context("Failed to shut down worker pool")?;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
