//! Client Router: multiplexed request/response over a persistent
//! bidirectional connection to an external desktop agent process.
//!
//! Pending commands are held in an id-keyed table of oneshot senders, the
//! same correlation-id pattern used elsewhere in this codebase for
//! cross-task request/reply. Transport is abstracted behind
//! [`AgentTransport`]; wiring an actual socket/websocket is outside this
//! module.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

use crate::domain::generate_id;

pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub id: String,
    #[serde(rename = "type")]
    pub command_type: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub id: String,
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("no agent connected: {0:?}")]
    NoAgent(Option<String>),
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("agent disconnected")]
    Disconnected,
    #[error("remote error: {0}")]
    Remote(String),
}

/// Abstraction over whatever wire protocol actually carries commands to a
/// connected desktop agent (websocket, unix socket, etc.)
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn send(&self, agent_id: &str, command: RemoteCommand) -> Result<(), RouterError>;
}

#[derive(Debug, Clone)]
pub struct AgentInfo {
    pub agent_id: String,
    pub capabilities: Vec<String>,
    pub last_heartbeat: i64,
}

struct PendingCall {
    reply_tx: oneshot::Sender<Result<Value, RouterError>>,
}

pub struct ClientRouter {
    agents: Mutex<HashMap<String, AgentInfo>>,
    pending: Mutex<HashMap<String, PendingCall>>,
    transport: Arc<dyn AgentTransport>,
    timeout: Duration,
}

impl ClientRouter {
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            transport,
            timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(transport: Arc<dyn AgentTransport>, timeout: Duration) -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            transport,
            timeout,
        }
    }

    pub async fn register_agent(&self, agent_id: impl Into<String>, capabilities: Vec<String>) {
        let agent_id = agent_id.into();
        debug!(%agent_id, "registering desktop agent");
        self.agents.lock().await.insert(
            agent_id.clone(),
            AgentInfo { agent_id, capabilities, last_heartbeat: taskstore::now_ms() },
        );
    }

    /// Drop the agent and reject every command still waiting on it.
    pub async fn unregister_agent(&self, agent_id: &str) {
        warn!(%agent_id, "desktop agent disconnected");
        self.agents.lock().await.remove(agent_id);
        let mut pending = self.pending.lock().await;
        let stale: Vec<String> = pending.keys().cloned().collect();
        for id in stale {
            if let Some(call) = pending.remove(&id) {
                let _ = call.reply_tx.send(Err(RouterError::Disconnected));
            }
        }
    }

    pub async fn heartbeat(&self, agent_id: &str) {
        if let Some(agent) = self.agents.lock().await.get_mut(agent_id) {
            agent.last_heartbeat = taskstore::now_ms();
        }
    }

    pub async fn is_connected(&self, agent_id: &str) -> bool {
        self.agents.lock().await.contains_key(agent_id)
    }

    pub async fn any_agent_connected(&self) -> bool {
        !self.agents.lock().await.is_empty()
    }

    /// Send a command to `agent_id` (or the sole connected agent if `None`),
    /// wait for the matching result via `handle_command_result`, or time
    /// out.
    pub async fn send_command(&self, command_type: &str, payload: Value, agent_id: Option<&str>) -> Result<Value, RouterError> {
        let target = match agent_id {
            Some(id) => {
                if !self.is_connected(id).await {
                    return Err(RouterError::NoAgent(Some(id.to_string())));
                }
                id.to_string()
            }
            None => {
                let agents = self.agents.lock().await;
                agents.keys().next().cloned().ok_or(RouterError::NoAgent(None))?
            }
        };

        let id = generate_id("cmd", command_type);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), PendingCall { reply_tx });

        let command = RemoteCommand { id: id.clone(), command_type: command_type.to_string(), payload };
        if let Err(e) = self.transport.send(&target, command).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RouterError::Disconnected),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(RouterError::Timeout(self.timeout))
            }
        }
    }

    /// Resolve a pending command. Unknown ids are logged and dropped.
    pub async fn handle_command_result(&self, id: &str, success: bool, result: Option<Value>, error: Option<String>) {
        let mut pending = self.pending.lock().await;
        let Some(call) = pending.remove(id) else {
            warn!(%id, "command result for unknown or already-resolved id");
            return;
        };
        let resolved = if success {
            Ok(result.unwrap_or(Value::Null))
        } else {
            Err(RouterError::Remote(error.unwrap_or_else(|| "unknown remote error".to_string())))
        };
        let _ = call.reply_tx.send(resolved);
    }

    pub async fn read_file(&self, agent_id: Option<&str>, path: &str) -> Result<Value, RouterError> {
        self.send_command("read_file", serde_json::json!({"path": path}), agent_id).await
    }

    pub async fn write_file(&self, agent_id: Option<&str>, path: &str, content: &str) -> Result<Value, RouterError> {
        self.send_command("write_file", serde_json::json!({"path": path, "content": content}), agent_id).await
    }

    pub async fn list_files(&self, agent_id: Option<&str>, path: &str) -> Result<Value, RouterError> {
        self.send_command("list_files", serde_json::json!({"path": path}), agent_id).await
    }

    pub async fn execute_terminal(&self, agent_id: Option<&str>, command: &str) -> Result<Value, RouterError> {
        self.send_command("execute_terminal", serde_json::json!({"command": command}), agent_id).await
    }

    pub async fn open_in_editor(&self, agent_id: Option<&str>, path: &str) -> Result<Value, RouterError> {
        self.send_command("open_in_editor", serde_json::json!({"path": path}), agent_id).await
    }

    pub async fn screenshot(&self, agent_id: Option<&str>) -> Result<Value, RouterError> {
        self.send_command("screenshot", serde_json::json!({}), agent_id).await
    }
}

/// Test/dev transport that immediately echoes back a canned result instead
/// of talking to a real agent.
#[cfg(test)]
pub struct EchoTransport {
    router: Mutex<Option<Arc<ClientRouter>>>,
}

#[cfg(test)]
impl EchoTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { router: Mutex::new(None) })
    }

    pub async fn bind(self: &Arc<Self>, router: Arc<ClientRouter>) {
        *self.router.lock().await = Some(router);
    }
}

#[cfg(test)]
#[async_trait]
impl AgentTransport for EchoTransport {
    async fn send(&self, _agent_id: &str, command: RemoteCommand) -> Result<(), RouterError> {
        let router = self.router.lock().await.clone();
        if let Some(router) = router {
            tokio::spawn(async move {
                router.handle_command_result(&command.id, true, Some(serde_json::json!({"echo": true})), None).await;
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub struct DeadTransport;

#[cfg(test)]
#[async_trait]
impl AgentTransport for DeadTransport {
    async fn send(&self, _agent_id: &str, _command: RemoteCommand) -> Result<(), RouterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_command_without_agent_fails() {
        let router = ClientRouter::new(Arc::new(DeadTransport));
        let err = router.send_command("read_file", serde_json::json!({}), None).await.unwrap_err();
        assert!(matches!(err, RouterError::NoAgent(None)));
    }

    #[tokio::test]
    async fn send_command_round_trips_through_handle_command_result() {
        let transport = EchoTransport::new();
        let router = Arc::new(ClientRouter::new(transport.clone()));
        transport.bind(router.clone()).await;

        router.register_agent("agent-1", vec!["files".to_string()]).await;
        let result = router.send_command("read_file", serde_json::json!({"path": "x"}), Some("agent-1")).await.unwrap();
        assert_eq!(result, serde_json::json!({"echo": true}));
    }

    #[tokio::test]
    async fn unregister_rejects_pending_calls() {
        let transport = Arc::new(DeadTransport);
        let router = Arc::new(ClientRouter::with_timeout(transport, Duration::from_secs(5)));
        router.register_agent("agent-1", vec![]).await;

        let router_clone = router.clone();
        let call = tokio::spawn(async move { router_clone.send_command("read_file", serde_json::json!({}), Some("agent-1")).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        router.unregister_agent("agent-1").await;

        let result = call.await.unwrap();
        assert!(matches!(result, Err(RouterError::Disconnected)));
    }

    #[tokio::test]
    async fn unknown_command_result_is_dropped_not_panicking() {
        let router = ClientRouter::new(Arc::new(DeadTransport));
        router.handle_command_result("nonexistent", true, None, None).await;
    }
}
