use std::io::Read as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use chimera_common::{Config, Lead};
use chimera_pipeline::stations::{BlueprintLoaderStation, PersistStation, ScraperEnrichmentStation};
use chimera_pipeline::{PipelineEngine, Station};
use chimera_queue::{BlueprintStore, MissionQueue};
use gps_router::{GpsRouter, RedisStatsStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_MAGAZINE: &[&str] = &["TruePeopleSearch", "FastPeopleSearch", "Spokeo"];
const DEFAULT_BUDGET: f64 = 1.0;
const DEFAULT_MISSION_TIMEOUT_S: u64 = 120;

fn load_lead(path: &str) -> Result<Lead> {
    let raw = if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading lead file '{path}'"))?
    };
    serde_json::from_str(&raw).with_context(|| "lead file must be a JSON-encoded Lead")
}

fn magazine_from_env() -> Vec<String> {
    match std::env::var("PROVIDER_MAGAZINE") {
        Ok(raw) if !raw.trim().is_empty() => raw.split(',').map(|s| s.trim().to_string()).collect(),
        _ => DEFAULT_MAGAZINE.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("chimera=info".parse()?))
        .init();

    info!("Chimera Runner starting...");

    let lead_path = std::env::args().nth(1).unwrap_or_else(|| "-".to_string());
    let lead = load_lead(&lead_path)?;

    let config = Config::from_env();
    config.log_redacted();

    let stats_store = Arc::new(RedisStatsStore::connect(&config.redis_url).await?);
    let gps = Arc::new(GpsRouter::new(stats_store, magazine_from_env()));
    let blueprints = Arc::new(BlueprintStore::connect(&config.redis_url).await?);
    let queue = Arc::new(MissionQueue::connect(&config.redis_url).await?);
    let pool = persistence::connect(config.database_url.as_deref(), config.db_pool_max, config.db_connect_timeout_s)
        .await
        .context("chimera-runner requires a working Postgres connection to persist golden records")?;

    let stations: Vec<Arc<dyn Station>> = vec![
        Arc::new(BlueprintLoaderStation::new(gps.clone(), blueprints)),
        Arc::new(ScraperEnrichmentStation::new(gps, queue, DEFAULT_MISSION_TIMEOUT_S)),
        Arc::new(PersistStation::new(pool)),
    ];
    let engine = PipelineEngine::new(stations);

    let report = engine.run(&lead, DEFAULT_BUDGET).await;
    let history: Vec<_> = report
        .history
        .iter()
        .map(|h| {
            serde_json::json!({
                "station": h.station,
                "status": format!("{:?}", h.status),
                "condition": h.condition.map(|c| format!("{c:?}")),
                "duration_ms": h.duration_ms,
                "error": h.error.as_ref().map(|e| e.to_string()),
            })
        })
        .collect();
    let summary = serde_json::json!({
        "fields": report.bag,
        "total_cost": report.total_cost,
        "stations_executed": report.stations_executed,
        "error_count": report.error_count,
        "history": history,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if report.error_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}
