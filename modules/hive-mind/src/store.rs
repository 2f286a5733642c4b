use std::sync::Arc;

use sqlx::PgPool;
use tracing::debug;

use crate::embedder::TextEmbedder;
use crate::error::Result;
use crate::similarity::cosine_distance;

const RECALL_DISTANCE_THRESHOLD: f64 = 0.02;
const SEMANTIC_SEARCH_SIMILARITY_THRESHOLD: f64 = 0.7;
const PREDICT_SIMILARITY_THRESHOLD: f64 = 0.6;
const AX_TREE_SUMMARY_TRUNCATE_CHARS: usize = 2000;

/// A recalled or searched memory entry.
pub struct MemoryHit {
    pub text: String,
    pub similarity: f64,
    pub action_plan: serde_json::Value,
}

/// Vector-similarity shared memory (SPEC_FULL.md §4.7): action-plan recall
/// keyed by screenshot hash, free-text semantic search, and lead-shape →
/// provider prediction. Postgres-backed (see DESIGN.md), grounded on
/// `rootsignal-graph`'s embedding cache and similarity builder.
pub struct HiveMind {
    pool: PgPool,
    embedder: Arc<dyn TextEmbedder>,
}

impl HiveMind {
    pub fn new(pool: PgPool, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { pool, embedder }
    }

    /// Idempotent DDL, run once at startup (SPEC_FULL.md §6: "All tables
    /// created idempotently on first use").
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS hive_experiences (
                screenshot_hash TEXT PRIMARY KEY,
                ax_tree_summary TEXT NOT NULL,
                embedding REAL[] NOT NULL,
                action_plan JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS hive_patterns (
                id BIGSERIAL PRIMARY KEY,
                pattern_text TEXT NOT NULL,
                embedding REAL[] NOT NULL,
                provider TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// `Store`: insert/overwrite under `experience:<screenshot_hash>`.
    pub async fn store_experience(
        &self,
        screenshot_hash: &str,
        ax_tree_summary: &str,
        action_plan: &serde_json::Value,
    ) -> Result<()> {
        let truncated: String = ax_tree_summary.chars().take(AX_TREE_SUMMARY_TRUNCATE_CHARS).collect();
        let embedding = self
            .embedder
            .embed(&format!("{truncated} {screenshot_hash}"))
            .await
            .map_err(|e| crate::error::HiveMindError::Embedder(e.to_string()))?;

        sqlx::query(
            "INSERT INTO hive_experiences (screenshot_hash, ax_tree_summary, embedding, action_plan)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (screenshot_hash) DO UPDATE SET
                ax_tree_summary = EXCLUDED.ax_tree_summary,
                embedding = EXCLUDED.embedding,
                action_plan = EXCLUDED.action_plan,
                created_at = now()",
        )
        .bind(screenshot_hash)
        .bind(&truncated)
        .bind(&embedding)
        .bind(action_plan)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// `Recall`: KNN-1 over the experience index; a hit is a cosine
    /// distance under 0.02.
    pub async fn recall(
        &self,
        ax_tree_summary: &str,
        screenshot_hash: &str,
    ) -> Result<Option<serde_json::Value>> {
        let query_embedding = self
            .embedder
            .embed(&format!("{ax_tree_summary} {screenshot_hash}"))
            .await
            .map_err(|e| crate::error::HiveMindError::Embedder(e.to_string()))?;

        let rows: Vec<(Vec<f32>, serde_json::Value)> =
            sqlx::query_as("SELECT embedding, action_plan FROM hive_experiences")
                .fetch_all(&self.pool)
                .await?;

        let mut best: Option<(f64, serde_json::Value)> = None;
        for (embedding, action_plan) in rows {
            let distance = cosine_distance(&query_embedding, &embedding);
            if best.as_ref().map(|(d, _)| distance < *d).unwrap_or(true) {
                best = Some((distance, action_plan));
            }
        }

        match best {
            Some((distance, action_plan)) if distance < RECALL_DISTANCE_THRESHOLD => {
                debug!(distance, "Hive Mind recall hit");
                Ok(Some(action_plan))
            }
            _ => Ok(None),
        }
    }

    /// `Semantic search`: KNN-k over the experience index; entries with
    /// similarity > 0.7, sorted descending.
    pub async fn semantic_search(&self, query: &str, top_k: usize) -> Result<Vec<MemoryHit>> {
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| crate::error::HiveMindError::Embedder(e.to_string()))?;

        let rows: Vec<(String, Vec<f32>, serde_json::Value)> = sqlx::query_as(
            "SELECT ax_tree_summary, embedding, action_plan FROM hive_experiences",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<MemoryHit> = rows
            .into_iter()
            .filter_map(|(text, embedding, action_plan)| {
                let similarity = 1.0 - cosine_distance(&query_embedding, &embedding);
                (similarity > SEMANTIC_SEARCH_SIMILARITY_THRESHOLD)
                    .then_some(MemoryHit { text, similarity, action_plan })
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Register an enrichment pattern: `(company, city, title)` text →
    /// provider that worked for it.
    pub async fn store_pattern(&self, company: &str, city: &str, title: &str, provider: &str) -> Result<()> {
        let text = format!("{company} {city} {title}");
        let embedding = self
            .embedder
            .embed(&text)
            .await
            .map_err(|e| crate::error::HiveMindError::Embedder(e.to_string()))?;

        sqlx::query(
            "INSERT INTO hive_patterns (pattern_text, embedding, provider) VALUES ($1, $2, $3)",
        )
        .bind(&text)
        .bind(&embedding)
        .bind(provider)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// `Predict enrichment path`: KNN-1 over the patterns index; returns the
    /// provider iff similarity > 0.6.
    pub async fn predict_enrichment_path(
        &self,
        company: &str,
        city: &str,
        title: &str,
    ) -> Result<Option<String>> {
        let text = format!("{company} {city} {title}");
        let query_embedding = self
            .embedder
            .embed(&text)
            .await
            .map_err(|e| crate::error::HiveMindError::Embedder(e.to_string()))?;

        let rows: Vec<(Vec<f32>, String)> =
            sqlx::query_as("SELECT embedding, provider FROM hive_patterns")
                .fetch_all(&self.pool)
                .await?;

        let mut best: Option<(f64, String)> = None;
        for (embedding, provider) in rows {
            let similarity = 1.0 - cosine_distance(&query_embedding, &embedding);
            if best.as_ref().map(|(s, _)| similarity > *s).unwrap_or(true) {
                best = Some((similarity, provider));
            }
        }

        Ok(best.and_then(|(similarity, provider)| (similarity > PREDICT_SIMILARITY_THRESHOLD).then_some(provider)))
    }
}
