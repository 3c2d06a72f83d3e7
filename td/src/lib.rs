//! TaskDaemon - Agentic Job Orchestration Core
//!
//! TaskDaemon durably queues, schedules, and executes jobs across a pool of
//! workers. Jobs declare priority and dependencies; the dispatcher claims
//! ready work onto idle workers, drives an LLM `Generator` round-trip, and
//! (for tool-type jobs) hands the reply to the Tool-Call Dispatcher for
//! structured execution. Everything durable lives in `taskstore`; nothing
//! that matters to recovery after a crash lives only in memory.
//!
//! # Modules
//!
//! - [`domain`] - `Job`, `JobResult`, `Worker`, `ToolTask`, `ExecutionLog`
//! - [`queue`] - durable, priority-aware, dependency-resolving job storage
//! - [`pool`] - worker lifecycle, heartbeat, health checks
//! - [`dispatcher`] - the control loop binding queue, pool, and execution
//! - [`worker`] - per-job execution, dispatched by payload type
//! - [`dispatch`] - the Tool-Call Dispatcher and its tool registry
//! - [`router`] - multiplexed request/response to a connected desktop agent
//! - [`generator`] - the LLM capability used by prompt/tool jobs
//! - [`llm`] - LLM client trait and concrete Anthropic/OpenAI implementations
//! - [`events`] - the event bus for live observability
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod dispatcher;
pub mod domain;
pub mod events;
pub mod generator;
pub mod llm;
pub mod pool;
pub mod queue;
pub mod router;
pub mod worker;

pub use config::{Config, JobsConfig, LlmConfig};
pub use dispatch::{DispatchContext, DispatchResult, ToolCallDispatcher, ToolRegistry};
pub use dispatcher::{DispatcherError, JobDispatcher};
pub use domain::{
    ExecutionLog, ExecutionMode, Filter, FilterOp, IndexValue, Job, JobPayload, JobResult, JobStatus, JobSubmission,
    JobType, PriorityBand, Record, Store, ToolCall, ToolTask, Worker, WorkerStatus,
};
pub use events::{EventBus, EventEmitter, EventLogEntry, JobEvent, create_event_bus};
pub use generator::{GenerateRequest, GenerateResponse, Generator, LlmGenerator};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use pool::{PoolError, WorkerPool};
pub use queue::{DependencyResolver, JobQueue, QueueError};
pub use router::{AgentTransport, ClientRouter, RouterError};
pub use worker::{ExecutionError, JobExecutor};
