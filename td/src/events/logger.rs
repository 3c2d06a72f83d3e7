//! Event Logger - persists events to JSONL files
//!
//! The EventLogger subscribes to the EventBus and writes all events to
//! per-job JSONL files for history, debugging, and replay.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, JobEvent};

/// Event logger that writes events to JSONL files
///
/// Events are written to `~/.taskdaemon/runs/{job-id}/events.jsonl`
pub struct EventLogger {
    /// Base directory for run data (~/.taskdaemon/runs)
    runs_dir: PathBuf,
    /// Open file writers per job/worker id
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    /// Create a new event logger
    pub fn new(runs_dir: impl AsRef<Path>) -> Self {
        let runs_dir = runs_dir.as_ref().to_path_buf();
        debug!(?runs_dir, "EventLogger::new: creating logger");
        Self {
            runs_dir,
            writers: HashMap::new(),
        }
    }

    /// Create a logger with the default runs directory (~/.taskdaemon/runs)
    pub fn with_default_path() -> eyre::Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| eyre::eyre!("Could not determine home directory"))?;
        let runs_dir = home.join(".taskdaemon").join("runs");
        fs::create_dir_all(&runs_dir)?;
        Ok(Self::new(runs_dir))
    }

    /// Write an event to its subject's log file
    pub fn write_event(&mut self, event: &JobEvent) -> eyre::Result<()> {
        let subject_id = event.subject_id();
        debug!(%subject_id, event_type = event.event_type(), "EventLogger::write_event");

        // Get or create writer for this subject
        let writer = if let Some(w) = self.writers.get_mut(subject_id) {
            w
        } else {
            // Create directory and file for new subject
            let subject_dir = self.runs_dir.join(subject_id);
            fs::create_dir_all(&subject_dir)?;

            let log_path = subject_dir.join("events.jsonl");
            debug!(?log_path, "EventLogger: creating new log file");

            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            let writer = BufWriter::new(file);
            self.writers.insert(subject_id.to_string(), writer);
            self.writers.get_mut(subject_id).unwrap()
        };

        // Write event as JSON line
        let entry = EventLogEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    /// Close writer for a subject (e.g., when a job reaches a terminal state)
    pub fn close_subject(&mut self, subject_id: &str) {
        debug!(%subject_id, "EventLogger::close_subject");
        if let Some(mut writer) = self.writers.remove(subject_id) {
            let _ = writer.flush();
        }
    }

    /// Run the logger, consuming events from the bus until shutdown
    ///
    /// This is meant to be spawned as a background task.
    pub async fn run(mut self, event_bus: Arc<EventBus>) {
        debug!("EventLogger::run: starting event logger");
        let mut rx = event_bus.subscribe();

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let subject_id = event.subject_id().to_string();
                    let is_terminal = matches!(event, JobEvent::JobCompleted { .. } | JobEvent::JobFailed { .. });

                    if let Err(e) = self.write_event(&event) {
                        error!(%subject_id, error = %e, "EventLogger: failed to write event");
                    }

                    if is_terminal {
                        self.close_subject(&subject_id);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                    // Continue processing - we'll catch up
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }

        // Flush all remaining writers
        for (subject_id, mut writer) in self.writers.drain() {
            debug!(%subject_id, "EventLogger: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

/// Read events for a subject from its log file
pub fn read_subject_events(runs_dir: impl AsRef<Path>, subject_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let log_path = runs_dir.as_ref().join(subject_id).join("events.jsonl");
    debug!(?log_path, "read_subject_events: reading log file");

    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&log_path)?;
    let mut entries = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line, error = %e, "read_subject_events: failed to parse line");
            }
        }
    }

    debug!(count = entries.len(), "read_subject_events: loaded entries");
    Ok(entries)
}

/// Spawn the event logger as a background task
pub fn spawn_event_logger(event_bus: Arc<EventBus>) -> eyre::Result<tokio::task::JoinHandle<()>> {
    let logger = EventLogger::with_default_path()?;
    Ok(tokio::spawn(async move {
        logger.run(event_bus).await;
    }))
}

/// Replay events for a job or worker from the default runs directory
///
/// Returns all events for the given subject id. Returns an empty Vec if
/// nothing was logged for it.
pub fn replay_subject_events(subject_id: &str) -> eyre::Result<Vec<JobEvent>> {
    let home = dirs::home_dir().ok_or_else(|| eyre::eyre!("Could not determine home directory"))?;
    let runs_dir = home.join(".taskdaemon").join("runs");
    let entries = read_subject_events(&runs_dir, subject_id)?;
    Ok(entries.into_iter().map(|e| e.event).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_event_logger_creation() {
        let temp = tempdir().unwrap();
        let logger = EventLogger::new(temp.path());
        assert!(logger.writers.is_empty());
    }

    #[test]
    fn test_write_event() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        let event = JobEvent::JobQueued {
            job_id: "test-123".to_string(),
            job_type: "prompt".to_string(),
            priority: 3,
        };

        logger.write_event(&event).unwrap();

        let log_path = temp.path().join("test-123").join("events.jsonl");
        assert!(log_path.exists());

        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("JobQueued"));
        assert!(content.contains("test-123"));
    }

    #[test]
    fn test_multiple_events_same_subject() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        let event1 = JobEvent::JobQueued {
            job_id: "test-123".to_string(),
            job_type: "prompt".to_string(),
            priority: 3,
        };
        let event2 = JobEvent::JobStarted {
            job_id: "test-123".to_string(),
            worker_id: "w-1".to_string(),
        };
        let event3 = JobEvent::JobCompleted {
            job_id: "test-123".to_string(),
            duration_ms: 10,
            input_tokens: 5,
            output_tokens: 5,
        };

        logger.write_event(&event1).unwrap();
        logger.write_event(&event2).unwrap();
        logger.write_event(&event3).unwrap();

        let log_path = temp.path().join("test-123").join("events.jsonl");
        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_multiple_subjects() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        let event1 = JobEvent::JobQueued {
            job_id: "job-1".to_string(),
            job_type: "prompt".to_string(),
            priority: 3,
        };
        let event2 = JobEvent::JobQueued {
            job_id: "job-2".to_string(),
            job_type: "tool".to_string(),
            priority: 5,
        };

        logger.write_event(&event1).unwrap();
        logger.write_event(&event2).unwrap();

        assert!(temp.path().join("job-1").join("events.jsonl").exists());
        assert!(temp.path().join("job-2").join("events.jsonl").exists());
    }

    #[test]
    fn test_read_subject_events() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger
            .write_event(&JobEvent::JobQueued {
                job_id: "test-read".to_string(),
                job_type: "prompt".to_string(),
                priority: 3,
            })
            .unwrap();
        logger
            .write_event(&JobEvent::JobStarted {
                job_id: "test-read".to_string(),
                worker_id: "w-1".to_string(),
            })
            .unwrap();

        let entries = read_subject_events(temp.path(), "test-read").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.event_type(), "JobQueued");
        assert_eq!(entries[1].event.event_type(), "JobStarted");
    }

    #[test]
    fn test_read_nonexistent_subject() {
        let temp = tempdir().unwrap();
        let entries = read_subject_events(temp.path(), "nonexistent").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_close_subject() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger
            .write_event(&JobEvent::JobQueued {
                job_id: "test-close".to_string(),
                job_type: "prompt".to_string(),
                priority: 3,
            })
            .unwrap();

        assert!(logger.writers.contains_key("test-close"));
        logger.close_subject("test-close");
        assert!(!logger.writers.contains_key("test-close"));
    }

    #[test]
    fn test_replay_preserves_order() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger
            .write_event(&JobEvent::JobQueued {
                job_id: "test-replay".to_string(),
                job_type: "prompt".to_string(),
                priority: 3,
            })
            .unwrap();
        logger
            .write_event(&JobEvent::JobStarted {
                job_id: "test-replay".to_string(),
                worker_id: "w-1".to_string(),
            })
            .unwrap();
        logger
            .write_event(&JobEvent::ToolCallStarted {
                job_id: "test-replay".to_string(),
                tool_name: "file_get".to_string(),
                args_summary: "path: /foo".to_string(),
            })
            .unwrap();
        logger
            .write_event(&JobEvent::JobCompleted {
                job_id: "test-replay".to_string(),
                duration_ms: 5,
                input_tokens: 1,
                output_tokens: 1,
            })
            .unwrap();

        let entries = read_subject_events(temp.path(), "test-replay").unwrap();
        assert_eq!(entries.len(), 4);

        assert_eq!(entries[0].event.event_type(), "JobQueued");
        assert_eq!(entries[1].event.event_type(), "JobStarted");
        assert_eq!(entries[2].event.event_type(), "ToolCallStarted");
        assert_eq!(entries[3].event.event_type(), "JobCompleted");
    }

    #[test]
    fn test_close_subject_idempotent() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger
            .write_event(&JobEvent::JobQueued {
                job_id: "idem-test".to_string(),
                job_type: "prompt".to_string(),
                priority: 3,
            })
            .unwrap();

        logger.close_subject("idem-test");
        logger.close_subject("idem-test");
        logger.close_subject("idem-test");

        assert!(!logger.writers.contains_key("idem-test"));
    }

    #[test]
    fn test_close_nonexistent_subject() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());
        logger.close_subject("never-existed");
    }

    #[test]
    fn test_subjects_are_isolated() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger
            .write_event(&JobEvent::JobQueued {
                job_id: "iso-1".to_string(),
                job_type: "prompt".to_string(),
                priority: 3,
            })
            .unwrap();
        logger
            .write_event(&JobEvent::JobQueued {
                job_id: "iso-2".to_string(),
                job_type: "tool".to_string(),
                priority: 5,
            })
            .unwrap();
        logger
            .write_event(&JobEvent::JobStarted {
                job_id: "iso-1".to_string(),
                worker_id: "w-1".to_string(),
            })
            .unwrap();

        let entries_1 = read_subject_events(temp.path(), "iso-1").unwrap();
        let entries_2 = read_subject_events(temp.path(), "iso-2").unwrap();

        assert_eq!(entries_1.len(), 2);
        assert_eq!(entries_2.len(), 1);

        assert!(entries_1.iter().all(|e| e.event.subject_id() == "iso-1"));
        assert!(entries_2.iter().all(|e| e.event.subject_id() == "iso-2"));
    }

    #[test]
    fn test_events_persisted_immediately() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger
            .write_event(&JobEvent::JobQueued {
                job_id: "persist-test".to_string(),
                job_type: "prompt".to_string(),
                priority: 3,
            })
            .unwrap();

        let log_path = temp.path().join("persist-test").join("events.jsonl");
        let content = std::fs::read_to_string(&log_path).unwrap();

        assert!(content.contains("JobQueued"));
        assert!(content.contains("persist-test"));
    }

    #[test]
    fn test_event_log_file_is_jsonl() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        for i in 0..5 {
            logger
                .write_event(&JobEvent::ToolCallStarted {
                    job_id: "jsonl-test".to_string(),
                    tool_name: "debug_echo".to_string(),
                    args_summary: format!("call {i}"),
                })
                .unwrap();
        }

        let log_path = temp.path().join("jsonl-test").join("events.jsonl");
        let content = std::fs::read_to_string(&log_path).unwrap();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);

        for line in lines {
            let parsed: serde_json::Value = serde_json::from_str(line).expect("Each line should be valid JSON");
            assert!(parsed.get("ts").is_some(), "Should have timestamp");
            assert!(parsed.get("event").is_some(), "Should have event");
        }
    }

    #[test]
    fn test_reopen_after_close() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger
            .write_event(&JobEvent::JobQueued {
                job_id: "reopen-test".to_string(),
                job_type: "prompt".to_string(),
                priority: 3,
            })
            .unwrap();

        logger.close_subject("reopen-test");

        logger
            .write_event(&JobEvent::JobCompleted {
                job_id: "reopen-test".to_string(),
                duration_ms: 1,
                input_tokens: 1,
                output_tokens: 1,
            })
            .unwrap();

        let entries = read_subject_events(temp.path(), "reopen-test").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.event_type(), "JobQueued");
        assert_eq!(entries[1].event.event_type(), "JobCompleted");
    }
}
