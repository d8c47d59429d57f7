mod checker;
mod config;
mod executor;
mod judge;
mod languages;
mod model;
mod queue;
mod sandbox;
mod store;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::WorkerConfig;
use crate::executor::Executor;
use crate::judge::Judge;
use crate::queue::QueueConsumer;
use crate::sandbox::DockerSandbox;
use crate::store::{PgProblemStore, PgSubmissionStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("judge=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let worker_config = WorkerConfig::from_env()?;

    languages::init_languages()?;
    info!("loaded language configurations");

    let db_pool = sqlx::PgPool::connect(&worker_config.database_url)
        .await
        .context("failed to connect to submission store")?;
    info!("connected to submission store");

    let sandbox = DockerSandbox::connect(&worker_config.sandbox_endpoint)
        .context("failed to connect to sandbox backend")?;
    info!("connected to sandbox backend");

    let scratch_root = std::env::temp_dir().join("judge-scratch");
    tokio::fs::create_dir_all(&scratch_root).await?;
    let executor = Executor::new(Box::new(sandbox), scratch_root);

    let submission_store = PgSubmissionStore::new(db_pool.clone());
    let problem_store = PgProblemStore::new(db_pool);
    let judge = Judge::new(&executor, &submission_store, &problem_store);

    let mut consumer = QueueConsumer::connect(
        &worker_config.queue_url,
        worker_config.queue_poll_secs,
        worker_config.error_backoff_secs,
    )
    .await
    .context("failed to connect to submission queue")?;
    info!("connected to submission queue, waiting for jobs");

    consumer.run(&judge).await
}
