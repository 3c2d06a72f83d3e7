//! Job Queue: durable, priority-aware, dependency-resolving job storage.
//!
//! The queue owns all status transitions on [`Job`]. Claiming uses
//! `taskstore`'s `conditional_update` so two workers racing for the same
//! queued job never both win. Readiness and failure propagation are
//! delegated to [`resolver::DependencyResolver`]; the queue applies what the
//! resolver decides.

mod error;
pub mod resolver;

pub use error::QueueError;
pub use resolver::DependencyResolver;

use std::sync::{Arc, Mutex};

use taskstore::{Filter, IndexValue, Store};

use crate::domain::{ExecutionMode, Job, JobPayload, JobResult, JobStatus, JobSubmission, JobType, PriorityBand};
use crate::events::EventBus;

pub struct JobQueue {
    store: Arc<Mutex<Store>>,
    events: Arc<EventBus>,
}

impl JobQueue {
    pub fn new(store: Arc<Mutex<Store>>, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Shared handle to the backing store, for callers (the dispatcher,
    /// tool handlers) that need direct read access alongside the queue.
    pub fn store_handle(&self) -> Arc<Mutex<Store>> {
        self.store.clone()
    }

    /// Accept a new job. Status starts `queued` if its dependencies are
    /// already satisfied (or it has none), otherwise `pending`.
    pub fn submit(&self, submission: JobSubmission) -> Result<Job, QueueError> {
        let mut job = Job::from_submission(submission);
        let mut store = self.lock();

        if DependencyResolver::is_ready(&store, &job)? {
            job.status = JobStatus::Queued;
        }

        let job = store.create(job)?;
        drop(store);

        if job.status == JobStatus::Queued {
            self.events.emitter_for(&job.id).job_queued(&job.job_type.to_string(), job.priority);
        }
        Ok(job)
    }

    pub fn submit_batch(&self, submissions: Vec<JobSubmission>) -> Vec<Result<Job, QueueError>> {
        submissions.into_iter().map(|s| self.submit(s)).collect()
    }

    /// Atomically claim the highest-priority ready job in `band` and bind it
    /// to `worker_id`. Races against other workers calling this
    /// concurrently; exactly one will observe `true` from the underlying
    /// `conditional_update` for any given job.
    pub fn claim_next(&self, band: PriorityBand, worker_id: &str) -> Result<Option<Job>, QueueError> {
        let mut store = self.lock();

        let mut candidates: Vec<Job> = store.list(&[Filter::eq("status", IndexValue::String("queued".to_string()))])?;
        candidates.retain(|j| PriorityBand::of(j.priority) == band);
        candidates.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));

        for job in candidates {
            let mut claimed = job.clone();
            claimed.status = JobStatus::Running;
            claimed.worker_id = Some(worker_id.to_string());
            claimed.started_at = Some(taskstore::now_ms());

            if store.conditional_update(&job.id, "$.status", "queued", claimed.clone())? {
                drop(store);
                self.events.emitter_for(&claimed.id).job_started(worker_id);
                return Ok(Some(claimed));
            }
        }
        Ok(None)
    }

    /// Record a successful completion and wake any dependents that are now
    /// ready.
    pub fn complete(&self, job_id: &str, result: JobResult) -> Result<(), QueueError> {
        let mut store = self.lock();
        let mut job = store.get::<Job>(job_id)?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        if job.status != JobStatus::Running {
            return Err(QueueError::InvalidTransition(job_id.to_string(), job.status.to_string()));
        }

        job.status = JobStatus::Completed;
        job.completed_at = Some(taskstore::now_ms());
        store.update(job.clone())?;
        store.create(result.clone())?;

        let woken = self.wake_dependents(&mut store, job_id)?;
        drop(store);

        let emitter = self.events.emitter_for(job_id);
        emitter.job_completed(result.duration_ms, result.input_tokens.unwrap_or(0), result.output_tokens.unwrap_or(0));
        for w in woken {
            self.events.emitter_for(&w.id).job_queued(&w.job_type.to_string(), w.priority);
        }
        Ok(())
    }

    /// Record a failure. Retries if under `max_retries`, otherwise marks the
    /// job terminally failed and propagates failure to dependents.
    pub fn fail(&self, job_id: &str, error: &str) -> Result<(), QueueError> {
        let mut store = self.lock();
        let mut job = store.get::<Job>(job_id)?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        if job.status != JobStatus::Running {
            return Err(QueueError::InvalidTransition(job_id.to_string(), job.status.to_string()));
        }

        job.retry_count += 1;
        job.last_error = Some(error.to_string());

        if job.retry_count < job.max_retries {
            job.status = JobStatus::Queued;
            job.worker_id = None;
            job.started_at = None;
            store.update(job.clone())?;
            drop(store);
            self.events.emitter_for(job_id).job_retry(job.retry_count, job.max_retries);
            return Ok(());
        }

        job.status = JobStatus::Failed;
        job.completed_at = Some(taskstore::now_ms());
        store.update(job.clone())?;
        store.create(JobResult::failure(job_id, error, 0))?;

        let propagated = self.propagate_failure(&mut store, job_id)?;
        drop(store);

        let emitter = self.events.emitter_for(job_id);
        emitter.job_failed(error, job.retry_count);
        for p in propagated {
            self.events.emitter_for(&p).job_failed(&format!("dependency failed: {job_id}"), 0);
        }
        Ok(())
    }

    /// Reclaim every `running` job still owned by `worker_id`, routing each
    /// through the same retry/fail semantics as any other execution
    /// failure. Called when the worker is retired so a job never gets
    /// stranded at `running` once its worker goes offline.
    pub fn reclaim_worker_jobs(&self, worker_id: &str) -> Result<Vec<String>, QueueError> {
        let running: Vec<Job> = {
            let store = self.lock();
            let mut jobs: Vec<Job> = store.list(&[Filter::eq("status", IndexValue::String("running".to_string()))])?;
            jobs.retain(|j| j.worker_id.as_deref() == Some(worker_id));
            jobs
        };

        let mut reclaimed = Vec::with_capacity(running.len());
        for job in running {
            self.fail(&job.id, "worker lost")?;
            reclaimed.push(job.id);
        }
        Ok(reclaimed)
    }

    /// Cancel a job that has not yet started running.
    pub fn cancel(&self, job_id: &str) -> Result<(), QueueError> {
        let mut store = self.lock();
        let mut job = store.get::<Job>(job_id)?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        if !matches!(job.status, JobStatus::Pending | JobStatus::Queued) {
            return Err(QueueError::InvalidTransition(job_id.to_string(), job.status.to_string()));
        }

        job.status = JobStatus::Cancelled;
        job.completed_at = Some(taskstore::now_ms());
        store.update(job)?;

        let propagated = self.propagate_failure(&mut store, job_id)?;
        drop(store);

        for p in propagated {
            self.events.emitter_for(&p).job_failed(&format!("dependency failed: {job_id}"), 0);
        }
        Ok(())
    }

    /// Park a running job pending operator input. Returns it to `pending`
    /// without touching retry accounting.
    pub fn mark_waiting_for_input(&self, job_id: &str) -> Result<(), QueueError> {
        let mut store = self.lock();
        let mut job = store.get::<Job>(job_id)?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        if job.status != JobStatus::Running {
            return Err(QueueError::InvalidTransition(job_id.to_string(), job.status.to_string()));
        }
        job.status = JobStatus::Pending;
        job.worker_id = None;
        store.update(job)?;
        drop(store);

        self.events.emitter_for(job_id).job_waiting_input();
        Ok(())
    }

    /// Merge operator-supplied input into a parked job's payload context and
    /// re-queue it.
    pub fn resume(&self, job_id: &str, operator_input: Option<serde_json::Value>) -> Result<Job, QueueError> {
        let mut store = self.lock();
        let mut job = store.get::<Job>(job_id)?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        if job.status != JobStatus::Pending {
            return Err(QueueError::InvalidTransition(job_id.to_string(), job.status.to_string()));
        }

        if let (JobPayload::Prompt { context, .. }, Some(input)) = (&mut job.payload, operator_input) {
            *context = Some(input);
        }
        job.status = JobStatus::Queued;
        let job = store.update(job)?;
        drop(store);

        self.events.emitter_for(&job.id).job_queued(&job.job_type.to_string(), job.priority);
        Ok(job)
    }

    /// Sweep every `pending` job and promote the ones whose dependencies
    /// have since been satisfied. A periodic correctness net alongside the
    /// targeted wake performed by `complete`.
    pub fn promote_ready(&self) -> Result<Vec<Job>, QueueError> {
        let mut store = self.lock();
        let ready = DependencyResolver::ready_jobs(&store)?;
        let mut promoted = Vec::new();
        for mut job in ready {
            job.status = JobStatus::Queued;
            let job = store.update(job)?;
            promoted.push(job);
        }
        drop(store);

        for job in &promoted {
            self.events.emitter_for(&job.id).job_queued(&job.job_type.to_string(), job.priority);
        }
        Ok(promoted)
    }

    /// Sweep every `pending` job with a failed or cancelled dependency and
    /// terminally fail it. Returns the ids flipped to `failed`.
    pub fn fail_blocked_on_dependencies(&self) -> Result<Vec<String>, QueueError> {
        let mut store = self.lock();
        let blocked = DependencyResolver::jobs_with_failed_deps(&store)?;
        let mut failed_ids = Vec::new();
        for (mut job, failed_deps) in blocked {
            let reason = format!("dependency failed: {}", failed_deps.join(", "));
            job.status = JobStatus::Failed;
            job.completed_at = Some(taskstore::now_ms());
            job.last_error = Some(reason.clone());
            store.update(job.clone())?;
            store.create(JobResult::failure(&job.id, &reason, 0))?;
            failed_ids.push(job.id);
        }
        drop(store);

        for id in &failed_ids {
            self.events.emitter_for(id).job_failed("blocked on failed dependency", 0);
        }
        Ok(failed_ids)
    }

    /// Return a claimed-but-not-yet-resolvable job (a composite still
    /// waiting on its children) to `queued` without touching retry
    /// accounting, so the next tick re-evaluates it.
    pub fn requeue(&self, job_id: &str) -> Result<(), QueueError> {
        let mut store = self.lock();
        let mut job = store.get::<Job>(job_id)?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        if job.status != JobStatus::Running {
            return Err(QueueError::InvalidTransition(job_id.to_string(), job.status.to_string()));
        }
        job.status = JobStatus::Queued;
        job.worker_id = None;
        job.started_at = None;
        store.update(job)?;
        Ok(())
    }

    /// Create a composite parent plus its step children. `sequential` wires
    /// step *i* to depend on step *i-1*; `parallel` adds no inter-step
    /// dependencies; `batch` completes only once composite evaluation
    /// observes every child done (no extra dependency wiring needed — the
    /// composite's own `executeJob` enforces it).
    pub fn submit_workflow(&self, name: &str, steps: Vec<JobSubmission>, mode: ExecutionMode) -> Result<Job, QueueError> {
        let mut child_ids = Vec::with_capacity(steps.len());
        for (i, mut step) in steps.into_iter().enumerate() {
            if mode == ExecutionMode::Sequential && i > 0 {
                step.dependencies.push(child_ids[i - 1].clone());
            }
            let child = self.submit(step)?;
            child_ids.push(child.id);
        }

        let parent = self.submit(JobSubmission {
            name: name.to_string(),
            job_type: JobType::Composite,
            priority: None,
            parent_job_id: None,
            dependencies: Vec::new(),
            execution_mode: mode,
            payload: JobPayload::Composite { child_jobs: child_ids.clone() },
            max_retries: None,
            timeout_ms: None,
            scheduled_for: None,
            cron_expression: None,
        })?;

        for child_id in &child_ids {
            self.set_parent(child_id, &parent.id)?;
        }
        Ok(parent)
    }

    fn set_parent(&self, child_id: &str, parent_id: &str) -> Result<(), QueueError> {
        let mut store = self.lock();
        let mut child = store.get::<Job>(child_id)?.ok_or_else(|| QueueError::NotFound(child_id.to_string()))?;
        child.parent_job_id = Some(parent_id.to_string());
        store.update(child)?;
        Ok(())
    }

    /// Add a dependency edge to an existing `pending` job, rejecting it with
    /// `QueueError::Cycle` if it would close a cycle. This is the only path
    /// by which a cycle could form after submission, since `submit` itself
    /// can only reference already-existing jobs.
    pub fn add_dependency(&self, job_id: &str, depends_on: &str) -> Result<(), QueueError> {
        let mut store = self.lock();
        let mut job = store.get::<Job>(job_id)?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        if job.status != JobStatus::Pending {
            return Err(QueueError::InvalidTransition(job_id.to_string(), job.status.to_string()));
        }
        if DependencyResolver::would_create_cycle(&store, job_id, depends_on)? {
            return Err(QueueError::Cycle(job_id.to_string(), depends_on.to_string()));
        }
        job.dependencies.push(depends_on.to_string());
        store.update(job)?;
        Ok(())
    }

    /// Jobs currently `pending` whose dependencies are all complete,
    /// transitioned to `queued` in place. Returns the jobs that woke up.
    fn wake_dependents(&self, store: &mut Store, job_id: &str) -> Result<Vec<Job>, QueueError> {
        let mut woken = Vec::new();
        for dependent_id in DependencyResolver::dependents(store, job_id)? {
            let Some(mut dependent) = store.get::<Job>(&dependent_id)? else {
                continue;
            };
            if dependent.status == JobStatus::Pending && DependencyResolver::is_ready(store, &dependent)? {
                dependent.status = JobStatus::Queued;
                store.update(dependent.clone())?;
                woken.push(dependent);
            }
        }
        Ok(woken)
    }

    /// Fail every `pending` dependent of `job_id`, transitively. Returns the
    /// ids that were flipped to `failed`.
    fn propagate_failure(&self, store: &mut Store, job_id: &str) -> Result<Vec<String>, QueueError> {
        let mut propagated = Vec::new();
        let mut frontier = vec![job_id.to_string()];

        while let Some(id) = frontier.pop() {
            for dependent_id in DependencyResolver::dependents(store, &id)? {
                let Some(mut dependent) = store.get::<Job>(&dependent_id)? else {
                    continue;
                };
                if dependent.status == JobStatus::Pending {
                    dependent.status = JobStatus::Failed;
                    dependent.completed_at = Some(taskstore::now_ms());
                    dependent.last_error = Some(format!("dependency failed: {id}"));
                    store.update(dependent.clone())?;
                    propagated.push(dependent.id.clone());
                    frontier.push(dependent.id);
                }
            }
        }
        Ok(propagated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExecutionMode, JobPayload, JobType};
    use crate::events::EventBus;

    fn queue() -> (JobQueue, tempfile::TempDir) {
        let (store, dir) = Store::open_temp().unwrap();
        let queue = JobQueue::new(Arc::new(Mutex::new(store)), Arc::new(EventBus::with_default_capacity()));
        (queue, dir)
    }

    fn prompt(name: &str, deps: Vec<String>) -> JobSubmission {
        JobSubmission {
            name: name.to_string(),
            job_type: JobType::Prompt,
            priority: None,
            parent_job_id: None,
            dependencies: deps,
            execution_mode: ExecutionMode::Sequential,
            payload: JobPayload::Prompt {
                prompt: "hi".to_string(),
                system_prompt: None,
                context: None,
            },
            max_retries: None,
            timeout_ms: None,
            scheduled_for: None,
            cron_expression: None,
        }
    }

    #[test]
    fn submit_with_no_deps_is_immediately_queued() {
        let (queue, _dir) = queue();
        let job = queue.submit(prompt("a", vec![])).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn submit_with_unsatisfied_deps_stays_pending() {
        let (queue, _dir) = queue();
        let job = queue.submit(prompt("a", vec!["missing".to_string()])).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn claim_next_only_claims_once() {
        let (queue, _dir) = queue();
        queue.submit(prompt("a", vec![])).unwrap();

        let first = queue.claim_next(PriorityBand::Normal, "w-1").unwrap();
        assert!(first.is_some());
        let second = queue.claim_next(PriorityBand::Normal, "w-2").unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn claim_next_respects_priority_within_band() {
        let (queue, _dir) = queue();
        let mut low = prompt("low", vec![]);
        low.priority = Some(5);
        let mut high = prompt("high", vec![]);
        high.priority = Some(3);
        queue.submit(low).unwrap();
        let high = queue.submit(high).unwrap();

        let claimed = queue.claim_next(PriorityBand::Normal, "w-1").unwrap().unwrap();
        assert_eq!(claimed.id, high.id);
    }

    #[test]
    fn complete_wakes_ready_dependents() {
        let (queue, _dir) = queue();
        let a = queue.submit(prompt("a", vec![])).unwrap();
        let b = queue.submit(prompt("b", vec![a.id.clone()])).unwrap();
        assert_eq!(b.status, JobStatus::Pending);

        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();
        queue
            .complete(&a.id, JobResult::success(&a.id, serde_json::json!({"ok": true}), 10, Some(1), Some(1)))
            .unwrap();

        let store = queue.lock();
        let b: Job = store.get(&b.id).unwrap().unwrap();
        assert_eq!(b.status, JobStatus::Queued);
    }

    #[test]
    fn fail_retries_until_limit_then_terminally_fails() {
        let (queue, _dir) = queue();
        let mut submission = prompt("a", vec![]);
        submission.max_retries = Some(1);
        let a = queue.submit(submission).unwrap();

        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();
        queue.fail(&a.id, "boom").unwrap();

        let store = queue.lock();
        let reloaded: Job = store.get(&a.id).unwrap().unwrap();
        assert_eq!(reloaded.status, JobStatus::Queued, "first failure should retry");
        drop(store);

        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();
        queue.fail(&a.id, "boom again").unwrap();

        let store = queue.lock();
        let reloaded: Job = store.get(&a.id).unwrap().unwrap();
        assert_eq!(reloaded.status, JobStatus::Failed);
    }

    #[test]
    fn fail_propagates_to_pending_dependents() {
        let (queue, _dir) = queue();
        let mut submission = prompt("a", vec![]);
        submission.max_retries = Some(0);
        let a = queue.submit(submission).unwrap();
        let b = queue.submit(prompt("b", vec![a.id.clone()])).unwrap();

        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();
        queue.fail(&a.id, "boom").unwrap();

        let store = queue.lock();
        let b: Job = store.get(&b.id).unwrap().unwrap();
        assert_eq!(b.status, JobStatus::Failed);
        assert!(b.last_error.unwrap().contains(&a.id));
    }

    #[test]
    fn cancel_only_allowed_before_running() {
        let (queue, _dir) = queue();
        let a = queue.submit(prompt("a", vec![])).unwrap();
        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();
        assert!(queue.cancel(&a.id).is_err());
    }

    #[test]
    fn fail_blocked_on_dependencies_fails_jobs_with_failed_deps() {
        let (queue, _dir) = queue();
        let mut submission = prompt("a", vec![]);
        submission.max_retries = Some(0);
        let a = queue.submit(submission).unwrap();
        let b = queue.submit(prompt("b", vec![a.id.clone()])).unwrap();

        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();
        // Fail "a" directly via the store to simulate it having failed
        // through some other path, then sweep.
        let mut store = queue.lock();
        let mut job: Job = store.get(&a.id).unwrap().unwrap();
        job.status = JobStatus::Failed;
        store.update(job).unwrap();
        drop(store);

        let failed = queue.fail_blocked_on_dependencies().unwrap();
        assert_eq!(failed, vec![b.id]);
    }

    #[test]
    fn requeue_returns_a_running_job_to_queued() {
        let (queue, _dir) = queue();
        let a = queue.submit(prompt("a", vec![])).unwrap();
        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();

        queue.requeue(&a.id).unwrap();

        let store = queue.lock();
        let reloaded: Job = store.get(&a.id).unwrap().unwrap();
        assert_eq!(reloaded.status, JobStatus::Queued);
        assert!(reloaded.worker_id.is_none());
    }

    #[test]
    fn submit_workflow_sequential_chains_dependencies() {
        let (queue, _dir) = queue();
        let steps = vec![prompt("step1", vec![]), prompt("step2", vec![]), prompt("step3", vec![])];
        let parent = queue.submit_workflow("wf", steps, ExecutionMode::Sequential).unwrap();

        match parent.payload {
            JobPayload::Composite { child_jobs } => {
                let store = queue.lock();
                let second: Job = store.get(&child_jobs[1]).unwrap().unwrap();
                assert_eq!(second.dependencies, vec![child_jobs[0].clone()]);
                let second_record: Job = store.get(&child_jobs[1]).unwrap().unwrap();
                assert_eq!(second_record.parent_job_id, Some(parent.id.clone()));
            }
            _ => panic!("expected composite payload"),
        }
    }

    #[test]
    fn submit_workflow_parallel_adds_no_dependencies() {
        let (queue, _dir) = queue();
        let steps = vec![prompt("step1", vec![]), prompt("step2", vec![])];
        let parent = queue.submit_workflow("wf", steps, ExecutionMode::Parallel).unwrap();

        match parent.payload {
            JobPayload::Composite { child_jobs } => {
                let store = queue.lock();
                for id in &child_jobs {
                    let child: Job = store.get(id).unwrap().unwrap();
                    assert!(child.dependencies.is_empty());
                }
            }
            _ => panic!("expected composite payload"),
        }
    }

    #[test]
    fn add_dependency_rejects_a_closing_cycle() {
        let (queue, _dir) = queue();
        let a = queue.submit(prompt("a", vec![])).unwrap();
        let b = queue.submit(prompt("b", vec![a.id.clone()])).unwrap();
        let c = queue.submit(prompt("c", vec![b.id.clone()])).unwrap();

        // a -> b -> c already holds; making a depend on c would close the loop.
        let err = queue.add_dependency(&a.id, &c.id).unwrap_err();
        assert!(matches!(err, QueueError::Cycle(_, _)));

        let store = queue.lock();
        let reloaded: Job = store.get(&a.id).unwrap().unwrap();
        assert!(reloaded.dependencies.is_empty());
    }

    #[test]
    fn add_dependency_accepts_a_non_cyclic_edge() {
        let (queue, _dir) = queue();
        let a = queue.submit(prompt("a", vec![])).unwrap();
        let b = queue.submit(prompt("b", vec![])).unwrap();

        queue.add_dependency(&b.id, &a.id).unwrap();

        let store = queue.lock();
        let reloaded: Job = store.get(&b.id).unwrap().unwrap();
        assert_eq!(reloaded.dependencies, vec![a.id]);
    }

    #[test]
    fn reclaim_worker_jobs_retries_under_the_limit() {
        let (queue, _dir) = queue();
        let a = queue.submit(prompt("a", vec![])).unwrap();
        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();

        let reclaimed = queue.reclaim_worker_jobs("w-1").unwrap();
        assert_eq!(reclaimed, vec![a.id.clone()]);

        let store = queue.lock();
        let reloaded: Job = store.get(&a.id).unwrap().unwrap();
        assert_eq!(reloaded.status, JobStatus::Queued);
        assert_eq!(reloaded.last_error, Some("worker lost".to_string()));
    }

    #[test]
    fn reclaim_worker_jobs_terminally_fails_past_retry_limit() {
        let (queue, _dir) = queue();
        let mut submission = prompt("a", vec![]);
        submission.max_retries = Some(0);
        let a = queue.submit(submission).unwrap();
        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();

        let reclaimed = queue.reclaim_worker_jobs("w-1").unwrap();
        assert_eq!(reclaimed, vec![a.id.clone()]);

        let store = queue.lock();
        let reloaded: Job = store.get(&a.id).unwrap().unwrap();
        assert_eq!(reloaded.status, JobStatus::Failed);
        assert_eq!(reloaded.last_error, Some("worker lost".to_string()));
    }

    #[test]
    fn reclaim_worker_jobs_ignores_jobs_owned_by_other_workers() {
        let (queue, _dir) = queue();
        queue.submit(prompt("a", vec![])).unwrap();
        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();

        let reclaimed = queue.reclaim_worker_jobs("w-2").unwrap();
        assert!(reclaimed.is_empty());
    }

    #[test]
    fn resume_merges_operator_input_and_requeues() {
        let (queue, _dir) = queue();
        let a = queue.submit(prompt("a", vec![])).unwrap();
        queue.claim_next(PriorityBand::Normal, "w-1").unwrap();
        queue.mark_waiting_for_input(&a.id).unwrap();

        let resumed = queue.resume(&a.id, Some(serde_json::json!({"answer": 42}))).unwrap();
        assert_eq!(resumed.status, JobStatus::Queued);
        match resumed.payload {
            JobPayload::Prompt { context, .. } => {
                assert_eq!(context, Some(serde_json::json!({"answer": 42})));
            }
            _ => panic!("expected prompt payload"),
        }
    }
}
