//! CLI command definitions for the job orchestration core.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use crate::domain::{ExecutionMode, JobType};

/// TaskDaemon - agentic job orchestration core
#[derive(Parser)]
#[command(
    name = "taskdaemon",
    about = "Durable priority-aware job scheduler and tool-call dispatcher",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// `JobType` restricted to the variants a caller may submit directly.
/// `Workflow` jobs are created through `submit-workflow`, not `submit`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum JobTypeArg {
    Prompt,
    Tool,
}

impl From<JobTypeArg> for JobType {
    fn from(arg: JobTypeArg) -> Self {
        match arg {
            JobTypeArg::Prompt => JobType::Prompt,
            JobTypeArg::Tool => JobType::Tool,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ExecutionModeArg {
    Sequential,
    Parallel,
    Batch,
}

impl From<ExecutionModeArg> for ExecutionMode {
    fn from(arg: ExecutionModeArg) -> Self {
        match arg {
            ExecutionModeArg::Sequential => ExecutionMode::Sequential,
            ExecutionModeArg::Parallel => ExecutionMode::Parallel,
            ExecutionModeArg::Batch => ExecutionMode::Batch,
        }
    }
}

/// CLI subcommands, one per external interface in the orchestration core.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the dispatcher and worker pool until interrupted
    Serve,

    /// Submit a single prompt or tool job
    Submit {
        /// Human-readable name
        name: String,

        /// Job type: prompt or tool
        #[arg(long = "type", value_enum, default_value = "prompt")]
        job_type: JobTypeArg,

        /// Prompt text (for `--type prompt`)
        #[arg(long)]
        prompt: Option<String>,

        /// System prompt (for `--type prompt`)
        #[arg(long)]
        system_prompt: Option<String>,

        /// Tool name (for `--type tool`), e.g. `send_chat`
        #[arg(long)]
        tool_name: Option<String>,

        /// Tool arguments as a JSON object (for `--type tool`)
        #[arg(long, default_value = "{}")]
        tool_args: String,

        /// Priority, lower runs first (default band: normal)
        #[arg(long)]
        priority: Option<i32>,

        /// Job ids this job depends on
        #[arg(long = "depends-on", value_delimiter = ',')]
        depends_on: Vec<String>,

        /// Override max retries
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// Submit a composite workflow of sequential, parallel, or batch steps
    SubmitWorkflow {
        /// Workflow name
        name: String,

        /// How the steps relate to one another
        #[arg(long, value_enum, default_value = "sequential")]
        mode: ExecutionModeArg,

        /// One prompt-job step per flag, e.g. `--step "draft the outline"`
        #[arg(long = "step", required = true)]
        steps: Vec<String>,
    },

    /// Show a job's current status and result
    Status {
        job_id: String,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Cancel a job that hasn't started running yet
    Cancel { job_id: String },

    /// List jobs, optionally filtered by status
    List {
        /// Filter by status (pending, queued, running, completed, failed, cancelled)
        #[arg(short, long)]
        status: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show queue depth, worker health, and throughput
    Health {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for status/list/health commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskdaemon")
        .join("logs")
        .join("taskdaemon.log");
    debug!(?path, "get_log_path: returning path");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["taskdaemon"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_submit_prompt() {
        let cli = Cli::parse_from(["taskdaemon", "submit", "draft", "--prompt", "write a haiku"]);
        match cli.command {
            Some(Command::Submit { name, prompt, .. }) => {
                assert_eq!(name, "draft");
                assert_eq!(prompt, Some("write a haiku".to_string()));
            }
            _ => panic!("expected Submit command"),
        }
    }

    #[test]
    fn test_cli_parse_submit_tool_with_depends_on() {
        let cli = Cli::parse_from([
            "taskdaemon",
            "submit",
            "notify",
            "--type",
            "tool",
            "--tool-name",
            "send_chat",
            "--depends-on",
            "job-a,job-b",
        ]);
        match cli.command {
            Some(Command::Submit { depends_on, tool_name, .. }) => {
                assert_eq!(depends_on, vec!["job-a".to_string(), "job-b".to_string()]);
                assert_eq!(tool_name, Some("send_chat".to_string()));
            }
            _ => panic!("expected Submit command"),
        }
    }

    #[test]
    fn test_cli_parse_submit_workflow() {
        let cli = Cli::parse_from([
            "taskdaemon",
            "submit-workflow",
            "release",
            "--mode",
            "parallel",
            "--step",
            "build",
            "--step",
            "test",
        ]);
        match cli.command {
            Some(Command::SubmitWorkflow { name, steps, .. }) => {
                assert_eq!(name, "release");
                assert_eq!(steps.len(), 2);
            }
            _ => panic!("expected SubmitWorkflow command"),
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["taskdaemon", "-c", "/path/to/config.yml", "health"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
    }
}
