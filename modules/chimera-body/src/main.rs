use std::sync::Arc;

use anyhow::Result;
use browserless_client::BrowserlessClient;
use chimera_common::{Config, HardwareEntropySeeds};
use chimera_queue::{CookieStore, ForbiddenRegionsStore, MissionQueue};
use chimera_worker::{EntropySink, Worker, WorkerConfig};
use sqlx::PgPool;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vision_client::HttpVisionClient;

/// Persists hardware entropy seeds to Postgres when a pool is configured;
/// degrades to a no-op when `DATABASE_URL` is unset, same soft-degradation
/// policy as the rest of persistence.
struct PersistenceEntropySink {
    pool: Option<PgPool>,
}

#[async_trait::async_trait]
impl EntropySink for PersistenceEntropySink {
    async fn record(&self, worker_id: &str, seeds: HardwareEntropySeeds) -> anyhow::Result<()> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };
        persistence::record_hardware_entropy(pool, worker_id, &seeds).await?;
        Ok(())
    }
}

async fn run_worker_loop(worker_idx: usize, queue: Arc<MissionQueue>, worker: Worker) {
    let worker_id = format!("worker-{worker_idx}");
    loop {
        let mission = match queue.pop_mission(5.0).await {
            Ok(Some(mission)) => mission,
            Ok(None) => continue,
            Err(err) => {
                error!(worker_id, error = %err, "failed to pop mission, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
        };

        let mission_id = mission.mission_id.clone();
        info!(worker_id, mission_id, target_provider = %mission.target_provider, "mission claimed");

        let result = worker.process_mission(mission).await;

        if let Err(err) = queue.push_result(&mission_id, &result).await {
            error!(worker_id, mission_id, error = %err, "failed to publish mission result");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("chimera=info".parse()?))
        .init();

    info!("Chimera Body starting...");

    let config = Config::from_env();
    config.log_redacted();

    let queue = Arc::new(MissionQueue::connect(&config.redis_url).await?);
    let forbidden = Arc::new(ForbiddenRegionsStore::connect(&config.redis_url).await?);
    let cookies = Arc::new(CookieStore::connect(&config.redis_url).await?);
    let vision = Arc::new(HttpVisionClient::new(&config.vision_brain_http_url));

    let pool = match persistence::connect(
        config.database_url.as_deref(),
        config.db_pool_max,
        config.db_connect_timeout_s,
    )
    .await
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            warn!(error = %err, "persistence disabled, hardware entropy will not be recorded");
            None
        }
    };
    let entropy_sink = Arc::new(PersistenceEntropySink { pool });

    tokio::spawn(chimera_common::serve_health(config.health_port, "chimera-body"));

    let mut workers = JoinSet::new();
    for worker_idx in 0..config.worker_pool_size {
        let browser = BrowserlessClient::new(&config.browserless_url, config.browserless_token.as_deref());
        let worker_config = WorkerConfig {
            worker_id: format!("worker-{worker_idx}"),
            ..WorkerConfig::from_common(&config)
        };
        let worker = Worker::new(
            browser,
            vision.clone() as Arc<dyn vision_client::VisionClient>,
            forbidden.clone() as Arc<dyn chimera_worker::ForbiddenLookup>,
            entropy_sink.clone() as Arc<dyn EntropySink>,
            worker_config,
        )
        .with_cookies(cookies.clone() as Arc<dyn chimera_worker::CookieLookup>);
        let queue = queue.clone();
        workers.spawn(run_worker_loop(worker_idx, queue, worker));
    }

    info!(pool_size = config.worker_pool_size, "worker pool running");
    while let Some(res) = workers.join_next().await {
        if let Err(err) = res {
            error!(error = %err, "a worker task panicked");
        }
    }

    Ok(())
}
