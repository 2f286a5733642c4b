use std::sync::Arc;

use async_trait::async_trait;
use chimera_common::{FieldBag, FieldKey};
use persistence::LeadUpsert;
use reconciler::ProviderRecord;
use serde_json::json;
use sqlx::PgPool;

use crate::context::PipelineContext;
use crate::error::EnrichmentError;
use crate::station::{Station, StationOutcome};

const REQUIRED: &[FieldKey] = &[FieldKey::LinkedinUrl];
const PRODUCED: &[FieldKey] = &[FieldKey::Saved, FieldKey::LeadId];

/// Reconciles every provider's contribution into one golden record and
/// writes it to Postgres. Last station in the graph; a write failure FAILs
/// the lead rather than degrading (SPEC_FULL.md §4.1/§4.9).
pub struct PersistStation {
    pool: PgPool,
}

impl PersistStation {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Station for PersistStation {
    fn name(&self) -> &str {
        "persist"
    }

    fn required_inputs(&self) -> &[FieldKey] {
        REQUIRED
    }

    fn produces_outputs(&self) -> &[FieldKey] {
        PRODUCED
    }

    fn cost_estimate(&self) -> f64 {
        0.0
    }

    async fn process(&self, ctx: &PipelineContext) -> Result<StationOutcome, EnrichmentError> {
        let linkedin_url = ctx.bag.get_str(FieldKey::LinkedinUrl).unwrap_or_default().to_string();

        let golden = if ctx.provider_contributions.is_empty() {
            ctx.bag.clone()
        } else {
            let records: Vec<ProviderRecord> = ctx
                .provider_contributions
                .iter()
                .map(|c| ProviderRecord::new(c.provider.clone(), c.weight, c.fields.clone()))
                .collect();
            let mut reconciled = reconciler::reconcile(&records);
            // Non-provider-sourced fields (identity, gatekeeping flags) are
            // never contested across providers; carry them through as-is.
            for (key, value) in &ctx.bag.fields {
                reconciled.fields.entry(*key).or_insert_with(|| value.clone());
            }
            for (key, value) in &ctx.bag.extras {
                reconciled.extras.entry(key.clone()).or_insert_with(|| value.clone());
            }
            reconciled
        };

        let upsert = LeadUpsert::from_field_bag(&linkedin_url, &golden);
        let lead_id = persistence::upsert_lead(&self.pool, &upsert)
            .await
            .map_err(|e| {
                EnrichmentError::new(self.name(), format!("failed to persist lead: {e}"))
                    .with_fix("check Postgres connectivity and retry")
            })?;

        let mut fields = FieldBag::default();
        fields.set(FieldKey::Saved, json!(true));
        fields.set(FieldKey::LeadId, json!(lead_id.to_string()));

        Ok(StationOutcome::continue_with(fields))
    }
}
