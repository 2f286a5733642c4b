use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chimera_common::{FieldBag, FieldKey};
use chimera_queue::BlueprintStore;
use gps_router::{GpsRouter, StatsStore};
use hive_mind::HiveMind;
use serde_json::json;
use tracing::warn;

use crate::context::PipelineContext;
use crate::error::EnrichmentError;
use crate::station::{Station, StationOutcome};

const REQUIRED: &[FieldKey] = &[FieldKey::LinkedinUrl];
const PRODUCED: &[FieldKey] = &[];

/// Picks a provider via GPS and loads its site blueprint before the
/// scraper is dispatched. Never fails: a missing blueprint degrades to
/// `mappingRequired` rather than halting the lead (SPEC_FULL.md §4.1).
/// Generic over the stats store so it can be exercised against an
/// in-memory double in tests, same as `GpsRouter` itself. Consults the
/// Hive Mind for a predicted provider from this lead's (company, city,
/// title) shape before falling back to plain epsilon-greedy selection
/// (SPEC_FULL.md §4.7/§4.3 "Hive-Mind shortcut").
pub struct BlueprintLoaderStation<S: StatsStore> {
    gps: Arc<GpsRouter<S>>,
    blueprints: Arc<BlueprintStore>,
    hive_mind: Option<Arc<HiveMind>>,
}

impl<S: StatsStore> BlueprintLoaderStation<S> {
    pub fn new(gps: Arc<GpsRouter<S>>, blueprints: Arc<BlueprintStore>) -> Self {
        Self { gps, blueprints, hive_mind: None }
    }

    pub fn with_hive_mind(mut self, hive_mind: Arc<HiveMind>) -> Self {
        self.hive_mind = Some(hive_mind);
        self
    }
}

#[async_trait]
impl<S: StatsStore + 'static> Station for BlueprintLoaderStation<S> {
    fn name(&self) -> &str {
        "blueprint_loader"
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
        let tried = HashSet::new();
        let state = ctx.bag.get_str(FieldKey::State);
        let mut fields = FieldBag::default();

        let preferred = match &self.hive_mind {
            Some(hive_mind) => {
                let company = ctx.bag.get_str(FieldKey::Company).unwrap_or_default();
                let city = ctx.bag.get_str(FieldKey::City).unwrap_or_default();
                let title = ctx.bag.get_str(FieldKey::Title).unwrap_or_default();
                hive_mind.predict_enrichment_path(company, city, title).await.unwrap_or_else(|err| {
                    warn!(error = %err, "Hive-Mind prediction lookup failed");
                    None
                })
            }
            None => None,
        };

        let provider = match self.gps.select(state, &tried, preferred.as_deref()).await {
            Ok(provider) => provider,
            Err(err) => {
                warn!(error = %err, "GPS has no candidate provider for blueprint lookup");
                fields.set(FieldKey::MappingRequired, json!(true));
                return Ok(StationOutcome::continue_with(fields));
            }
        };

        match self.blueprints.get(&provider).await {
            Ok(Some(blueprint)) => {
                let value = serde_json::to_value(&blueprint)
                    .unwrap_or(serde_json::Value::Null);
                fields.set(FieldKey::Blueprint, value);
            }
            Ok(None) => {
                fields.set(FieldKey::MappingRequired, json!(true));
            }
            Err(err) => {
                warn!(error = %err, provider, "blueprint store lookup failed");
                fields.set(FieldKey::MappingRequired, json!(true));
            }
        }

        fields.extras.insert("_provider".to_string(), json!(provider));
        Ok(StationOutcome::continue_with(fields))
    }
}
