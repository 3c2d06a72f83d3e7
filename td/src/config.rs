//! taskdaemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main taskdaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,

    /// Worker pool and retry knobs
    pub jobs: JobsConfig,

    /// Taskstore/contextstore locations
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration with fallback chain, then apply env var
    /// overrides for the job orchestration knobs.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(config_path)?;
        config.jobs.apply_env_overrides();
        Ok(config)
    }

    fn load_file(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".taskdaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("taskdaemon").join("taskdaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration as read from YAML. Provider-neutral until
/// `resolve()` picks a concrete backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "anthropic" or "openai"
    pub provider: String,

    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

impl LlmConfig {
    /// Resolve into the shape the concrete clients need. Currently a
    /// straight field copy; exists as a seam for per-provider defaults
    /// (e.g. a different base_url per provider) without changing the
    /// YAML surface.
    pub fn resolve(&self) -> Result<ResolvedLlmConfig> {
        Ok(ResolvedLlmConfig {
            provider: self.provider.clone(),
            model: self.model.clone(),
            api_key_env: self.api_key_env.clone(),
            base_url: self.base_url.clone(),
            max_tokens: self.max_tokens,
            timeout_ms: self.timeout_ms,
        })
    }
}

/// Resolved LLM configuration, consumed by the concrete client
/// constructors (`AnthropicClient::from_config`, `OpenAIClient::from_config`).
#[derive(Debug, Clone)]
pub struct ResolvedLlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl ResolvedLlmConfig {
    /// Read the API key from the configured environment variable.
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("environment variable {} not set", self.api_key_env))
    }
}

/// Worker pool sizing and retry defaults. Each field has a YAML default
/// and an env var override, per the spec's external-interface knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    #[serde(rename = "workers-min")]
    pub workers_min: usize,

    #[serde(rename = "workers-max")]
    pub workers_max: usize,

    #[serde(rename = "retry-limit")]
    pub retry_limit: u32,

    /// Base retry backoff, milliseconds
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Seconds a job may sit unclaimed/running before it is considered
    /// expired and eligible for requeue
    #[serde(rename = "expire-seconds")]
    pub expire_seconds: u64,

    /// Worker health check interval, milliseconds
    #[serde(rename = "health-check-interval-ms")]
    pub health_check_interval_ms: u64,

    /// Worker heartbeat refresh interval, milliseconds
    #[serde(rename = "heartbeat-interval-ms")]
    pub heartbeat_interval_ms: u64,

    /// A worker whose heartbeat is older than this is considered unhealthy
    #[serde(rename = "unhealthy-threshold-ms")]
    pub unhealthy_threshold_ms: i64,

    /// Consecutive job failures before a worker is removed
    #[serde(rename = "max-consecutive-failures")]
    pub max_consecutive_failures: u32,

    /// Dispatcher tick interval, milliseconds
    #[serde(rename = "dispatch-tick-ms")]
    pub dispatch_tick_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers_min: 1,
            workers_max: 8,
            retry_limit: 3,
            retry_delay_ms: 1000,
            expire_seconds: 300,
            health_check_interval_ms: 60_000,
            heartbeat_interval_ms: 30_000,
            unhealthy_threshold_ms: 120_000,
            max_consecutive_failures: 5,
            dispatch_tick_ms: 2000,
        }
    }
}

impl JobsConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_usize("JOB_WORKERS_MIN") {
            self.workers_min = v;
        }
        if let Some(v) = env_usize("JOB_WORKERS_MAX") {
            self.workers_max = v;
        }
        if let Some(v) = env_u32("JOB_RETRY_LIMIT") {
            self.retry_limit = v;
        }
        if let Some(v) = env_u64("JOB_RETRY_DELAY") {
            self.retry_delay_ms = v;
        }
        if let Some(v) = env_u64("JOB_EXPIRE_SECONDS") {
            self.expire_seconds = v;
        }
        if let Some(v) = env_u64("JOB_HEALTH_CHECK_INTERVAL") {
            self.health_check_interval_ms = v;
        }
        if let Some(v) = env_u64("JOB_HEARTBEAT_INTERVAL") {
            self.heartbeat_interval_ms = v;
        }
        if let Some(v) = env_i64("JOB_UNHEALTHY_THRESHOLD") {
            self.unhealthy_threshold_ms = v;
        }
        if let Some(v) = env_u32("JOB_MAX_CONSECUTIVE_FAILURES") {
            self.max_consecutive_failures = v;
        }
        if let Some(v) = env_u64("JOB_DISPATCH_TICK") {
            self.dispatch_tick_ms = v;
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Storage configuration for the taskstore-backed collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "taskstore-dir")]
    pub taskstore_dir: String,

    #[serde(rename = "contextstore-dir")]
    pub contextstore_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            taskstore_dir: ".taskstore".to_string(),
            contextstore_dir: ".contextstore".to_string(),
        }
    }
}
