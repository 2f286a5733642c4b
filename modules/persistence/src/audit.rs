use chimera_common::{HardwareEntropySeeds, MissionResult, MissionStatus};
use sqlx::PgPool;

use crate::error::Result;

fn status_str(status: MissionStatus) -> &'static str {
    match status {
        MissionStatus::Queued => "queued",
        MissionStatus::Claimed => "claimed",
        MissionStatus::Executing => "executing",
        MissionStatus::Completed => "completed",
        MissionStatus::Failed => "failed",
        MissionStatus::TimedOut => "timed_out",
    }
}

pub async fn record_mission_result(
    pool: &PgPool,
    mission_id: &str,
    lead_linkedin_url: Option<&str>,
    result: &MissionResult,
) -> Result<()> {
    let extracted = serde_json::to_value(&result.extracted).unwrap_or(serde_json::Value::Null);
    let trauma_signals = serde_json::to_value(&result.trauma_signals).unwrap_or(serde_json::Value::Null);

    sqlx::query(
        "INSERT INTO mission_results (
            mission_id, lead_linkedin_url, provider, status, vision_confidence,
            captcha_solved, duration_s, extracted, trauma_signals
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(mission_id)
    .bind(lead_linkedin_url)
    .bind(&result.provider)
    .bind(status_str(result.status))
    .bind(result.vision_confidence)
    .bind(result.captcha_solved)
    .bind(result.duration_s)
    .bind(extracted)
    .bind(trauma_signals)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn record_selector_repair(
    pool: &PgPool,
    domain: &str,
    intent: &str,
    old_selector: Option<&str>,
    new_selector: &str,
    confidence: f64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO selector_repairs (domain, intent, old_selector, new_selector, confidence)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(domain)
    .bind(intent)
    .bind(old_selector)
    .bind(new_selector)
    .bind(confidence)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn upsert_site_cognitive_map(pool: &PgPool, url: &str, summary: &serde_json::Value) -> Result<()> {
    sqlx::query(
        "INSERT INTO site_cognitive_maps (url, summary) VALUES ($1, $2)
         ON CONFLICT (url) DO UPDATE SET summary = EXCLUDED.summary, updated_at = now()",
    )
    .bind(url)
    .bind(summary)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn record_hardware_entropy(pool: &PgPool, worker_id: &str, seeds: &HardwareEntropySeeds) -> Result<()> {
    sqlx::query(
        "INSERT INTO hardware_entropy (worker_id, gpu_seed, audio_seed, canvas_seed)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(worker_id)
    .bind(seeds.gpu as i64)
    .bind(seeds.audio as i64)
    .bind(seeds.canvas as i64)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn upsert_site_blueprint(pool: &PgPool, domain: &str, blueprint: &serde_json::Value) -> Result<()> {
    sqlx::query(
        "INSERT INTO site_blueprints (domain, blueprint) VALUES ($1, $2)
         ON CONFLICT (domain) DO UPDATE SET blueprint = EXCLUDED.blueprint, updated_at = now()",
    )
    .bind(domain)
    .bind(blueprint)
    .execute(pool)
    .await?;

    Ok(())
}
