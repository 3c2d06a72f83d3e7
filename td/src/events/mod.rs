//! Event Bus Architecture for Live Observability
//!
//! This module provides the event system for real-time visibility into the
//! job scheduler's activity. Every significant action emits an event. All
//! consumers (CLI, file logger, database) subscribe to the bus.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       EVENT BUS                              │
//! │            (tokio::sync::broadcast channel)                  │
//! │                                                              │
//! │  Every action emits an event. Every consumer subscribes.    │
//! └─────────────────────────────────────────────────────────────┘
//!         ↑               ↑               ↑               ↑
//!    Job Queue      Worker Pool     Tool Dispatcher   Dispatcher
//!    emits:          emits:           emits:          emits:
//!    - JobQueued     - WorkerSpawned  - ToolCallStart  - JobStarted
//!    - JobRetry      - WorkerRemoved  - ToolCallDone   - JobCompleted
//!                                                      - JobFailed
//!
//!         ↓               ↓               ↓               ↓
//! ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐
//! │ CLI       │   │ File Log  │   │ Database  │   │ Metrics   │
//! │ Streaming │   │ .jsonl    │   │ (history) │   │ (future)  │
//! └───────────┘   └───────────┘   └───────────┘   └───────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use td::events::{EventBus, JobEvent};
//! use std::sync::Arc;
//!
//! // Create event bus (typically at app startup)
//! let event_bus = Arc::new(EventBus::with_default_capacity());
//!
//! // Get emitter for a specific job
//! let emitter = event_bus.emitter_for("a1b2c3-job-run-tests");
//!
//! // Emit events using convenience methods
//! emitter.job_queued("tool", 3);
//! emitter.job_started("w-1");
//! emitter.job_completed(1200, 100, 50);
//!
//! // Subscribe to events (for CLI, loggers, etc.)
//! let mut rx = event_bus.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     println!("Event: {:?}", event);
//! }
//! ```
//!
//! # Event Types
//!
//! See [`JobEvent`] for the complete list of events:
//! - Job lifecycle: `JobQueued`, `JobStarted`, `JobCompleted`, `JobFailed`, `JobRetry`, `JobWaitingInput`
//! - Worker pool lifecycle: `WorkerSpawned`, `WorkerRemoved`
//! - Tool dispatch: `ToolCallStarted`, `ToolCallCompleted`
//! - Errors: `Error`, `Warning`

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use logger::{EventLogger, read_subject_events, replay_subject_events, spawn_event_logger};
pub use types::{EventLogEntry, JobEvent};
