//! Job Dispatcher: the long-lived control loop that binds the queue, the
//! worker pool, and job execution together. A single task fans work out
//! onto independent worker tasks; workers never share mutable state with
//! each other, only the durable queue (§5 concurrency model).

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::config::JobsConfig;
use crate::domain::{Job, PriorityBand};
use crate::events::EventBus;
use crate::pool::{PoolError, WorkerPool};
use crate::queue::{JobQueue, QueueError};
use crate::worker::{ExecutionError, JobExecutor};

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Every `LOW_BAND_DRAIN_PERIOD` ticks, try the Low band before High/Normal
/// so a steady stream of urgent work can never fully starve it.
const LOW_BAND_DRAIN_PERIOD: u64 = 5;

pub struct JobDispatcher {
    queue: Arc<JobQueue>,
    pool: Arc<WorkerPool>,
    executor: Arc<JobExecutor>,
    events: Arc<EventBus>,
    tick_ms: u64,
    health_check_interval_ms: u64,
    heartbeat_interval_ms: u64,
}

impl JobDispatcher {
    pub fn new(queue: Arc<JobQueue>, pool: Arc<WorkerPool>, executor: Arc<JobExecutor>, events: Arc<EventBus>, config: &JobsConfig) -> Self {
        Self {
            queue,
            pool,
            executor,
            events,
            tick_ms: config.dispatch_tick_ms,
            health_check_interval_ms: config.health_check_interval_ms,
            heartbeat_interval_ms: config.heartbeat_interval_ms,
        }
    }

    fn band_order(tick: u64) -> [PriorityBand; 3] {
        if tick % LOW_BAND_DRAIN_PERIOD == 0 {
            [PriorityBand::Low, PriorityBand::High, PriorityBand::Normal]
        } else {
            PriorityBand::all()
        }
    }

    /// Run the control loop until `shutdown` resolves. Alongside the
    /// dispatch tick, a health-check ticker retires stale workers (and
    /// reclaims their jobs) and a heartbeat ticker refreshes every live
    /// worker's `lastHeartbeat`, so neither subsystem only runs in tests.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        let mut ticker = interval(Duration::from_millis(self.tick_ms));
        let mut health_ticker = interval(Duration::from_millis(self.health_check_interval_ms));
        let mut heartbeat_ticker = interval(Duration::from_millis(self.heartbeat_interval_ms));
        let mut tick: u64 = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tick = tick.wrapping_add(1);
                    if let Err(e) = self.run_once(tick).await {
                        warn!(error = %e, "dispatcher tick failed");
                    }
                }
                _ = health_ticker.tick() => {
                    match self.pool.health_check().await {
                        Ok(removed) if !removed.is_empty() => debug!(workers = ?removed, "health check retired workers"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "health check failed"),
                    }
                }
                _ = heartbeat_ticker.tick() => {
                    if let Err(e) = self.pool.heartbeat_all() {
                        warn!(error = %e, "heartbeat sweep failed");
                    }
                }
                _ = &mut shutdown => {
                    debug!("dispatcher shutting down");
                    return;
                }
            }
        }
    }

    /// One iteration of the loop described in §4.4: propagate dependency
    /// failures, promote newly-ready jobs, then claim and dispatch work
    /// across bands until no idle worker is available.
    pub async fn run_once(&self, tick: u64) -> Result<(), DispatcherError> {
        let failed = self.queue.fail_blocked_on_dependencies()?;
        for id in &failed {
            debug!(job_id = %id, "job failed: blocked on failed dependency");
        }

        self.queue.promote_ready()?;

        for band in Self::band_order(tick) {
            self.drain_band(band).await?;
        }
        Ok(())
    }

    /// Claim and dispatch ready jobs in `band` until either the band is
    /// empty or no worker is available (and scale-up can't produce one) —
    /// at which point this tick defers the remainder, not an error.
    async fn drain_band(&self, band: PriorityBand) -> Result<(), DispatcherError> {
        loop {
            let worker = match self.pool.available_workers()?.into_iter().next() {
                Some(worker) => worker,
                None => match self.pool.scale_up().await? {
                    Some(worker) => worker,
                    None => return Ok(()),
                },
            };

            match self.queue.claim_next(band, &worker.id)? {
                Some(job) => {
                    self.pool.mark_busy(&worker.id, &job.id)?;
                    self.spawn_execution(job, worker.id);
                }
                None => return Ok(()),
            }
        }
    }

    fn spawn_execution(&self, job: Job, worker_id: String) {
        let queue = self.queue.clone();
        let pool = self.pool.clone();
        let executor = self.executor.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let start = Instant::now();
            let outcome = executor.execute(&job).await;
            debug!(job_id = %job.id, elapsed_ms = start.elapsed().as_millis() as u64, "job execution finished");

            match outcome {
                Ok(result) => {
                    let success = result.success;
                    let tokens = result.input_tokens.unwrap_or(0) + result.output_tokens.unwrap_or(0);
                    let outcome = if success {
                        queue.complete(&job.id, result)
                    } else {
                        let error = result.error.clone().unwrap_or_else(|| "execution failed".to_string());
                        queue.fail(&job.id, &error)
                    };
                    if let Err(e) = outcome {
                        warn!(job_id = %job.id, error = %e, "failed to record job outcome");
                    }
                    if let Err(e) = pool.mark_idle(&worker_id, success, tokens) {
                        warn!(worker_id = %worker_id, error = %e, "failed to mark worker idle");
                    }
                }
                Err(ExecutionError::WaitingOnChildren) => {
                    if let Err(e) = queue.requeue(&job.id) {
                        warn!(job_id = %job.id, error = %e, "failed to requeue composite job");
                    }
                    if let Err(e) = pool.mark_idle(&worker_id, true, 0) {
                        warn!(worker_id = %worker_id, error = %e, "failed to mark worker idle");
                    }
                }
                Err(e) => {
                    events.emitter_for(&job.id).error("execute_job", &e.to_string());
                    if let Err(e) = queue.fail(&job.id, &e.to_string()) {
                        warn!(job_id = %job.id, error = %e, "failed to record job failure");
                    }
                    if let Err(e) = pool.mark_idle(&worker_id, false, 0) {
                        warn!(worker_id = %worker_id, error = %e, "failed to mark worker idle");
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use taskstore::Store;

    use super::*;
    use crate::dispatch::ToolCallDispatcher;
    use crate::domain::{ExecutionMode, JobPayload, JobResult, JobStatus, JobSubmission, JobType};
    use crate::events::EventBus;
    use crate::generator::{GenerateRequest, GenerateResponse, Generator};
    use crate::llm::LlmError;

    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
            Ok(GenerateResponse { text: format!("echo: {}", request.prompt), input_tokens: 1, output_tokens: 1 })
        }
    }

    fn setup(workers_min: usize) -> (Arc<JobDispatcher>, Arc<JobQueue>, tempfile::TempDir, tempfile::TempDir) {
        let workspace = tempfile::tempdir().unwrap();
        let (store, store_dir) = Store::open_temp().unwrap();
        let store = Arc::new(std::sync::Mutex::new(store));
        let events = Arc::new(EventBus::with_default_capacity());

        let queue = Arc::new(JobQueue::new(store.clone(), events.clone()));
        let config = crate::config::JobsConfig { workers_min, dispatch_tick_ms: 2000, ..crate::config::JobsConfig::default() };
        let pool = Arc::new(WorkerPool::new(store.clone(), events.clone(), config.clone(), "test-worker").with_queue(queue.clone()));
        let dispatcher = Arc::new(ToolCallDispatcher::standard());
        let executor = Arc::new(JobExecutor::new(Arc::new(EchoGenerator), dispatcher, store.clone(), workspace.path().to_path_buf()));

        let job_dispatcher = Arc::new(JobDispatcher::new(queue.clone(), pool, executor, events, &config));
        (job_dispatcher, queue, workspace, store_dir)
    }

    fn prompt(name: &str, deps: Vec<String>) -> JobSubmission {
        JobSubmission {
            name: name.to_string(),
            job_type: JobType::Prompt,
            priority: None,
            parent_job_id: None,
            dependencies: deps,
            execution_mode: ExecutionMode::Sequential,
            payload: JobPayload::Prompt { prompt: "hi".to_string(), system_prompt: None, context: None },
            max_retries: None,
            timeout_ms: None,
            scheduled_for: None,
            cron_expression: None,
        }
    }

    #[tokio::test]
    async fn run_once_claims_and_completes_a_ready_job() {
        let (dispatcher, queue, _w, _s) = setup(1);
        dispatcher.pool.start().await.unwrap();
        let job = queue.submit(prompt("a", vec![])).unwrap();

        dispatcher.run_once(1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result: Vec<JobResult> = {
            let store = queue.store_handle().lock().unwrap();
            store.list(&[]).unwrap()
        };
        assert!(result.iter().any(|r| r.job_id == job.id && r.success));
    }

    #[tokio::test]
    async fn run_once_fails_jobs_blocked_on_failed_dependencies() {
        let (dispatcher, queue, _w, _s) = setup(1);
        dispatcher.pool.start().await.unwrap();

        let mut failing = prompt("a", vec![]);
        failing.max_retries = Some(0);
        let a = queue.submit(failing).unwrap();
        let b = queue.submit(prompt("b", vec![a.id.clone()])).unwrap();

        dispatcher.run_once(1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        dispatcher.run_once(2).await.unwrap();

        let store = queue.store_handle().lock().unwrap();
        let b: Job = store.get(&b.id).unwrap().unwrap();
        assert_eq!(b.status, JobStatus::Failed);
    }
}
