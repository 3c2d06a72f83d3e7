//! Worker Pool: keeps a fleet of [`Worker`] records alive between
//! `workers_min` and `workers_max`, heartbeats them, and retires the
//! unhealthy ones.
//!
//! Grounded in the same shared-state-behind-a-mutex shape the scheduler
//! uses (`Arc<Mutex<_>>` + `Notify` for slot availability), adapted here
//! to durable `Worker` rows instead of in-memory request records.

use std::sync::Arc;

use taskstore::{Filter, IndexValue, Store};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::config::JobsConfig;
use crate::domain::{Worker, WorkerStatus};
use crate::events::EventBus;
use crate::queue::JobQueue;

mod error;
pub use error::PoolError;

/// Manages a fleet of workers backed by `taskstore`. Spawns up to
/// `workers_min` on startup, heartbeats them, and removes workers that go
/// unhealthy or fail too many jobs in a row, replacing them if the fleet
/// drops below `workers_min`.
pub struct WorkerPool {
    store: Arc<std::sync::Mutex<Store>>,
    events: Arc<EventBus>,
    config: JobsConfig,
    worker_type: String,
    slot_available: Notify,
    scale_lock: Mutex<()>,
    queue: Option<Arc<JobQueue>>,
}

impl WorkerPool {
    pub fn new(store: Arc<std::sync::Mutex<Store>>, events: Arc<EventBus>, config: JobsConfig, worker_type: impl Into<String>) -> Self {
        Self {
            store,
            events,
            config,
            worker_type: worker_type.into(),
            slot_available: Notify::new(),
            scale_lock: Mutex::new(()),
            queue: None,
        }
    }

    /// Bind the job queue so a retired worker's `running` job can be
    /// reclaimed instead of stranded. Mirrors `JobExecutor::with_queue`.
    pub fn with_queue(mut self, queue: Arc<JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Bring the fleet up to `workers_min` idle workers. Call once at
    /// startup.
    pub async fn start(&self) -> Result<(), PoolError> {
        let _guard = self.scale_lock.lock().await;
        let current = self.live_workers()?.len();
        for _ in current..self.config.workers_min {
            self.spawn_one()?;
        }
        Ok(())
    }

    /// All workers not marked offline.
    pub fn live_workers(&self) -> Result<Vec<Worker>, PoolError> {
        let store = self.lock_store();
        let all: Vec<Worker> = store.list(&[])?;
        Ok(all.into_iter().filter(|w| w.status != WorkerStatus::Offline).collect())
    }

    /// Idle workers with spare concurrency, ordered by least-loaded first.
    pub fn available_workers(&self) -> Result<Vec<Worker>, PoolError> {
        let mut workers = self.live_workers()?;
        workers.retain(|w| w.is_available());
        workers.sort_by_key(|w| w.active_jobs);
        Ok(workers)
    }

    /// Wait until at least one worker is available, scaling up if the fleet
    /// has headroom and none currently are.
    pub async fn wait_for_worker(&self) -> Result<Worker, PoolError> {
        loop {
            let available = self.available_workers()?;
            if let Some(worker) = available.into_iter().next() {
                return Ok(worker);
            }
            if self.live_workers()?.len() < self.config.workers_max {
                self.scale_up().await?;
                continue;
            }
            self.slot_available.notified().await;
        }
    }

    /// Spawn one additional worker, if under `workers_max`.
    pub async fn scale_up(&self) -> Result<Option<Worker>, PoolError> {
        let _guard = self.scale_lock.lock().await;
        if self.live_workers()?.len() >= self.config.workers_max {
            return Ok(None);
        }
        Ok(Some(self.spawn_one()?))
    }

    /// Take the fleet down to `workers_min` by retiring idle workers.
    pub async fn scale_down(&self) -> Result<usize, PoolError> {
        let _guard = self.scale_lock.lock().await;
        let mut live = self.live_workers()?;
        let mut removed = 0;
        while live.len() > self.config.workers_min {
            let Some(pos) = live.iter().position(|w| w.status == WorkerStatus::Idle) else {
                break;
            };
            let worker = live.remove(pos);
            self.retire(&worker.id, "scaled down")?;
            removed += 1;
        }
        Ok(removed)
    }

    fn spawn_one(&self) -> Result<Worker, PoolError> {
        let mut worker = Worker::new(self.worker_type.clone());
        worker.max_concurrency = 1;
        let mut store = self.lock_store();
        let worker = store.create(worker)?;
        drop(store);
        self.events.emitter_for(&worker.id).worker_spawned();
        debug!(worker_id = %worker.id, "spawned worker");
        Ok(worker)
    }

    fn retire(&self, worker_id: &str, reason: &str) -> Result<(), PoolError> {
        let mut store = self.lock_store();
        let Some(mut worker) = store.get::<Worker>(worker_id)? else {
            return Ok(());
        };
        worker.status = WorkerStatus::Offline;
        store.update(worker)?;
        drop(store);
        self.events.emitter_for(worker_id).worker_removed(reason);

        if let Some(queue) = &self.queue {
            match queue.reclaim_worker_jobs(worker_id) {
                Ok(reclaimed) if !reclaimed.is_empty() => {
                    warn!(worker_id = %worker_id, jobs = ?reclaimed, "reclaimed running jobs from retired worker");
                }
                Ok(_) => {}
                Err(e) => warn!(worker_id = %worker_id, error = %e, "failed to reclaim jobs from retired worker"),
            }
        }
        Ok(())
    }

    /// Refresh a worker's heartbeat. Called periodically by whatever is
    /// driving the worker (the dispatcher, in this codebase).
    pub fn heartbeat(&self, worker_id: &str) -> Result<(), PoolError> {
        let mut store = self.lock_store();
        let mut worker = store.get::<Worker>(worker_id)?.ok_or_else(|| PoolError::NotFound(worker_id.to_string()))?;
        worker.last_heartbeat = taskstore::now_ms();
        store.update(worker)?;
        Ok(())
    }

    /// Refresh every live worker's heartbeat in one sweep. Called by the
    /// dispatcher's heartbeat ticker so `is_healthy` never goes stale for a
    /// worker that is actually still alive.
    pub fn heartbeat_all(&self) -> Result<(), PoolError> {
        for worker in self.live_workers()? {
            self.heartbeat(&worker.id)?;
        }
        Ok(())
    }

    /// Record that `worker_id` picked up a job.
    pub fn mark_busy(&self, worker_id: &str, job_id: &str) -> Result<(), PoolError> {
        let mut store = self.lock_store();
        let mut worker = store.get::<Worker>(worker_id)?.ok_or_else(|| PoolError::NotFound(worker_id.to_string()))?;
        worker.status = WorkerStatus::Busy;
        worker.current_job_id = Some(job_id.to_string());
        worker.active_jobs += 1;
        store.update(worker)?;
        Ok(())
    }

    /// Record that `worker_id` finished a job, successfully or not.
    pub fn mark_idle(&self, worker_id: &str, success: bool, tokens_used: u64) -> Result<(), PoolError> {
        let mut store = self.lock_store();
        let mut worker = store.get::<Worker>(worker_id)?.ok_or_else(|| PoolError::NotFound(worker_id.to_string()))?;
        worker.active_jobs = worker.active_jobs.saturating_sub(1);
        worker.current_job_id = None;
        worker.total_jobs_processed += 1;
        worker.total_tokens_used += tokens_used;
        worker.status = if worker.active_jobs == 0 { WorkerStatus::Idle } else { WorkerStatus::Busy };
        worker.consecutive_failures = if success { 0 } else { worker.consecutive_failures + 1 };
        let removed = worker.consecutive_failures >= self.config.max_consecutive_failures;
        store.update(worker)?;
        drop(store);

        if removed {
            self.retire(worker_id, "too many consecutive failures")?;
        }
        self.slot_available.notify_waiters();
        Ok(())
    }

    /// Sweep for workers whose heartbeat has gone stale, removing them and
    /// replacing below `workers_min`.
    pub async fn health_check(&self) -> Result<Vec<String>, PoolError> {
        let stale: Vec<Worker> = {
            let store = self.lock_store();
            let workers: Vec<Worker> = store.list(&[Filter::eq("status", IndexValue::String("idle".to_string()))])?;
            let mut busy: Vec<Worker> = store.list(&[Filter::eq("status", IndexValue::String("busy".to_string()))])?;
            let mut all = workers;
            all.append(&mut busy);
            all.into_iter()
                .filter(|w| !w.is_healthy(self.config.unhealthy_threshold_ms))
                .collect()
        };

        let mut removed_ids = Vec::new();
        for worker in &stale {
            warn!(worker_id = %worker.id, "worker heartbeat stale, retiring");
            self.retire(&worker.id, "unhealthy heartbeat")?;
            removed_ids.push(worker.id.clone());
        }

        let current = self.live_workers()?.len();
        if current < self.config.workers_min {
            for _ in current..self.config.workers_min {
                self.spawn_one()?;
            }
            info!(replaced = self.config.workers_min - current, "replenished worker pool");
        }
        Ok(removed_ids)
    }

    /// Take every worker offline. Used at shutdown.
    pub async fn shutdown(&self) -> Result<(), PoolError> {
        let _guard = self.scale_lock.lock().await;
        for worker in self.live_workers()? {
            self.retire(&worker.id, "shutdown")?;
        }
        Ok(())
    }
}
