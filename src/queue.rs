//! Submission queue consumer (C6): a single-threaded blocking-pop loop over
//! Redis, dispatching each job to the judge pipeline (C5) synchronously.
//!
//! Grounded on the teacher's `RedisManager`, trimmed to the one operation
//! this worker needs -- `BLPOP` off a fixed key -- and generalized from its
//! worker-ID/lease/pub-sub machinery (outside this spec's scope) to the
//! bare consumer loop spec section 4.6 describes.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{error, info, warn};

use crate::judge::Judge;
use crate::model::Job;

/// Redis key the API enqueues submissions onto (spec section 6).
pub const JUDGE_QUEUE_KEY: &str = "judge:queue";

pub struct QueueConsumer {
    conn: ConnectionManager,
    poll_timeout: Duration,
    error_backoff: Duration,
}

impl QueueConsumer {
    pub async fn connect(
        redis_url: &str,
        poll_timeout_secs: u64,
        error_backoff_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            poll_timeout: Duration::from_secs(poll_timeout_secs),
            error_backoff: Duration::from_secs(error_backoff_secs),
        })
    }

    /// Runs forever. Only returns on an unrecoverable setup error; per-job
    /// failures are caught, logged, and followed by a backoff (spec 4.6,
    /// section 7's "Queue errors" taxonomy entry).
    pub async fn run(&mut self, judge: &Judge<'_>) -> anyhow::Result<()> {
        loop {
            let popped: Option<(String, String)> = match self
                .conn
                .blpop(JUDGE_QUEUE_KEY, self.poll_timeout.as_secs_f64())
                .await
            {
                Ok(popped) => popped,
                Err(err) => {
                    error!(%err, "queue poll failed");
                    tokio::time::sleep(self.error_backoff).await;
                    continue;
                }
            };

            let Some((_key, payload)) = popped else {
                continue;
            };

            match serde_json::from_str::<Job>(&payload) {
                Ok(job) => {
                    info!(submission_id = job.submission_id, "dispatching job");
                    if let Err(err) = judge.run(&job).await {
                        error!(submission_id = job.submission_id, %err, "job failed");
                        tokio::time::sleep(self.error_backoff).await;
                    }
                }
                Err(err) => {
                    warn!(%err, payload, "failed to decode job payload");
                    tokio::time::sleep(self.error_backoff).await;
                }
            }
        }
    }
}
