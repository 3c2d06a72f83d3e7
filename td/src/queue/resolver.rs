//! Dependency resolution over the job graph
//!
//! Stateless: every operation reads the current snapshot out of the store.
//! The queue is the only writer; the resolver only ever answers questions
//! about readiness, failure propagation, and graph shape.

use std::collections::HashSet;

use taskstore::{Filter, IndexValue, Store};

use crate::domain::{Job, JobStatus};

use super::error::QueueError;

pub struct DependencyResolver;

impl DependencyResolver {
    /// A pending job is ready iff every dependency id exists and is completed.
    pub fn is_ready(store: &Store, job: &Job) -> Result<bool, QueueError> {
        for dep_id in &job.dependencies {
            match store.get::<Job>(dep_id)? {
                Some(dep) if dep.status == JobStatus::Completed => continue,
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Dependencies of `job` that are failed or cancelled, if any. A pending
    /// job can never be simultaneously ready and have a failed dependency:
    /// `is_ready` requires every dependency completed, so the two are
    /// mutually exclusive by construction.
    pub fn failed_dependencies(store: &Store, job: &Job) -> Result<Option<Vec<String>>, QueueError> {
        let mut failed = Vec::new();
        for dep_id in &job.dependencies {
            if let Some(dep) = store.get::<Job>(dep_id)?
                && matches!(dep.status, JobStatus::Failed | JobStatus::Cancelled)
            {
                failed.push(dep_id.clone());
            }
        }
        Ok(if failed.is_empty() { None } else { Some(failed) })
    }

    /// All pending jobs that are ready to be queued, ordered by priority
    /// ascending then `created_at` ascending.
    pub fn ready_jobs(store: &Store) -> Result<Vec<Job>, QueueError> {
        let pending: Vec<Job> = store.list(&[Filter::eq("status", IndexValue::String("pending".to_string()))])?;
        let mut ready = Vec::new();
        for job in pending {
            if Self::is_ready(store, &job)? {
                ready.push(job);
            }
        }
        ready.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(ready)
    }

    /// All pending jobs whose dependency set contains a failed or cancelled
    /// job, paired with the offending dependency ids.
    pub fn jobs_with_failed_deps(store: &Store) -> Result<Vec<(Job, Vec<String>)>, QueueError> {
        let pending: Vec<Job> = store.list(&[Filter::eq("status", IndexValue::String("pending".to_string()))])?;
        let mut out = Vec::new();
        for job in pending {
            if let Some(failed) = Self::failed_dependencies(store, &job)? {
                out.push((job, failed));
            }
        }
        Ok(out)
    }

    /// Transitive predecessors of `job_id`: every dependency, and every
    /// dependency of those, and so on.
    pub fn dependency_chain(store: &Store, job_id: &str) -> Result<Vec<String>, QueueError> {
        let mut seen = HashSet::new();
        let mut stack = vec![job_id.to_string()];
        let mut chain = Vec::new();

        while let Some(id) = stack.pop() {
            let Some(job) = store.get::<Job>(&id)? else {
                continue;
            };
            for dep in &job.dependencies {
                if seen.insert(dep.clone()) {
                    chain.push(dep.clone());
                    stack.push(dep.clone());
                }
            }
        }
        Ok(chain)
    }

    /// Direct successors of `job_id`: jobs that list it as a dependency.
    pub fn dependents(store: &Store, job_id: &str) -> Result<Vec<String>, QueueError> {
        let all: Vec<Job> = store.list(&[])?;
        Ok(all
            .into_iter()
            .filter(|j| j.dependencies.iter().any(|d| d == job_id))
            .map(|j| j.id)
            .collect())
    }

    /// True if making `from` depend on `to` would create a cycle, i.e. `from`
    /// is already reachable by following dependency edges out of `to`.
    pub fn would_create_cycle(store: &Store, from: &str, to: &str) -> Result<bool, QueueError> {
        if from == to {
            return Ok(true);
        }
        let mut seen = HashSet::new();
        let mut stack = vec![to.to_string()];
        while let Some(id) = stack.pop() {
            if id == from {
                return Ok(true);
            }
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(job) = store.get::<Job>(&id)? {
                stack.extend(job.dependencies.iter().cloned());
            }
        }
        Ok(false)
    }
}
