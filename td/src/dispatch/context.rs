//! DispatchContext: the sandboxed execution environment one tool-call
//! dispatch runs inside. Scoped to a workspace root the same way
//! `ToolContext` scopes file tools to a loop's git worktree.

use std::path::PathBuf;
use std::sync::Arc;

use taskstore::Store;
use tracing::debug;

use super::error::DispatchError;
use super::routing::sanitize_server_path;
use crate::queue::JobQueue;
use crate::router::ClientRouter;

/// The last Generator round-trip this job's worker performed, surfaced by
/// the `debug_echo` tool.
#[derive(Debug, Clone, Default)]
pub struct LastGeneratorCall {
    pub system_prompt: Option<String>,
    pub prompt: Option<String>,
    pub reply: Option<String>,
}

pub struct DispatchContext {
    pub workspace_dir: PathBuf,
    pub job_id: String,
    pub store: Arc<std::sync::Mutex<Store>>,
    pub queue: Option<Arc<JobQueue>>,
    pub client_router: Option<Arc<ClientRouter>>,
    pub last_call: LastGeneratorCall,
}

impl DispatchContext {
    pub fn new(workspace_dir: PathBuf, job_id: impl Into<String>, store: Arc<std::sync::Mutex<Store>>) -> Self {
        Self {
            workspace_dir,
            job_id: job_id.into(),
            store,
            queue: None,
            client_router: None,
            last_call: LastGeneratorCall::default(),
        }
    }

    pub fn with_queue(mut self, queue: Arc<JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_client_router(mut self, router: Arc<ClientRouter>) -> Self {
        self.client_router = Some(router);
        self
    }

    pub fn with_last_call(mut self, call: LastGeneratorCall) -> Self {
        self.last_call = call;
        self
    }

    pub fn lock_store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve a (already-sanitized, relative) server path against the
    /// workspace root, rejecting any resolution that escapes it.
    pub fn resolve_server_path(&self, path: &str) -> Result<PathBuf, DispatchError> {
        let sanitized = sanitize_server_path(path);
        let joined = self.workspace_dir.join(&sanitized);
        debug!(?joined, "DispatchContext::resolve_server_path");

        let parent = joined.parent().unwrap_or(&self.workspace_dir);
        let canonical_parent = if parent.exists() {
            parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf())
        } else {
            parent.to_path_buf()
        };
        let workspace_canonical = self.workspace_dir.canonicalize().unwrap_or_else(|_| self.workspace_dir.clone());

        if !canonical_parent.starts_with(&workspace_canonical) {
            return Err(DispatchError::InvalidParams(format!("path escapes workspace: {path}")));
        }
        Ok(joined)
    }

    pub fn client_router(&self) -> Result<&Arc<ClientRouter>, DispatchError> {
        self.client_router.as_ref().ok_or(DispatchError::NoAgent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> (DispatchContext, tempfile::TempDir, tempfile::TempDir) {
        let workspace = tempfile::tempdir().unwrap();
        let (store, store_dir) = Store::open_temp().unwrap();
        let ctx = DispatchContext::new(workspace.path().to_path_buf(), "job-1", Arc::new(std::sync::Mutex::new(store)));
        (ctx, workspace, store_dir)
    }

    #[test]
    fn resolve_server_path_stays_within_workspace() {
        let (ctx, _workspace, _store_dir) = ctx();
        let resolved = ctx.resolve_server_path("notes/todo.txt").unwrap();
        assert!(resolved.starts_with(&ctx.workspace_dir));
    }

    #[test]
    fn resolve_server_path_strips_dotdot_before_resolving() {
        let (ctx, _workspace, _store_dir) = ctx();
        let resolved = ctx.resolve_server_path("../../etc/passwd").unwrap();
        assert!(resolved.starts_with(&ctx.workspace_dir));
    }

    #[test]
    fn client_router_missing_is_an_error() {
        let (ctx, _workspace, _store_dir) = ctx();
        assert!(ctx.client_router().is_err());
    }
}
