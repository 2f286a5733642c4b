use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::{PersistenceError, Result};

/// Open a bounded connection pool and run the idempotent schema DDL.
///
/// `database_url` absent means persistence is soft-disabled (SPEC_FULL.md
/// §6: "Missing `DATABASE_URL` disables persistence ... log at critical").
/// Callers should treat [`PersistenceError::Disabled`] as a degrade-not-fail
/// signal, not a startup abort.
pub async fn connect(
    database_url: Option<&str>,
    max_connections: u32,
    connect_timeout_s: u64,
) -> Result<PgPool> {
    let url = match database_url {
        Some(url) => url,
        None => {
            warn!("DATABASE_URL not set; persistence is disabled");
            return Err(PersistenceError::Disabled);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(connect_timeout_s))
        .connect(url)
        .await?;

    ensure_schema(&pool).await?;
    info!(max_connections, "Postgres pool ready");
    Ok(pool)
}

pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS leads (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            linkedin_url TEXT UNIQUE NOT NULL,
            name TEXT,
            phone TEXT,
            email TEXT,
            city TEXT,
            state TEXT,
            zipcode TEXT,
            age INTEGER,
            income BIGINT,
            dnc_status BOOLEAN,
            can_contact BOOLEAN,
            confidence_age DOUBLE PRECISION,
            confidence_income DOUBLE PRECISION,
            source_metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
            enriched_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS mission_results (
            id BIGSERIAL PRIMARY KEY,
            mission_id TEXT NOT NULL,
            lead_linkedin_url TEXT,
            provider TEXT NOT NULL,
            status TEXT NOT NULL,
            vision_confidence DOUBLE PRECISION NOT NULL,
            captcha_solved BOOLEAN NOT NULL,
            duration_s DOUBLE PRECISION NOT NULL,
            extracted JSONB NOT NULL,
            trauma_signals JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS selector_repairs (
            id BIGSERIAL PRIMARY KEY,
            domain TEXT NOT NULL,
            intent TEXT NOT NULL,
            old_selector TEXT,
            new_selector TEXT NOT NULL,
            confidence DOUBLE PRECISION NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS site_cognitive_maps (
            url TEXT PRIMARY KEY,
            summary JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS hardware_entropy (
            id BIGSERIAL PRIMARY KEY,
            worker_id TEXT NOT NULL,
            gpu_seed BIGINT NOT NULL,
            audio_seed BIGINT NOT NULL,
            canvas_seed BIGINT NOT NULL,
            allocated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS site_blueprints (
            domain TEXT PRIMARY KEY,
            blueprint JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
