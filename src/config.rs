//! Worker configuration, loaded once from the environment.
//!
//! No command-line flags (spec section 6): every knob is an environment
//! variable, read with `dotenvy` + `std::env::var` the way the teacher's
//! Redis/storage clients bootstrap themselves.

use std::env;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Redis connection URL backing the submission queue.
    pub queue_url: String,
    /// Postgres connection URL backing the submission and problem stores.
    pub database_url: String,
    /// Docker daemon endpoint used by the sandbox driver, e.g. `unix:///var/run/docker.sock`.
    pub sandbox_endpoint: String,
    /// How long the blocking queue pop waits before looping again, in seconds.
    pub queue_poll_secs: u64,
    /// Backoff applied after a job fails to process, in seconds.
    pub error_backoff_secs: u64,
}

impl WorkerConfig {
    /// Load configuration from the environment, failing fast on missing
    /// required values. Mirrors the teacher's `RedisManager::from_env` /
    /// `StorageClient::from_env` constructors.
    pub fn from_env() -> anyhow::Result<Self> {
        let queue_url =
            env::var("QUEUE_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let sandbox_endpoint = env::var("SANDBOX_ENDPOINT")
            .unwrap_or_else(|_| "unix:///var/run/docker.sock".to_string());

        Ok(Self {
            queue_url,
            database_url,
            sandbox_endpoint,
            queue_poll_secs: 1,
            error_backoff_secs: 1,
        })
    }
}
