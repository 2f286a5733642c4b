use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chimera_common::{Blueprint, FieldBag, FieldKey, Lead, Mission, MissionStatus};
use chimera_queue::MissionQueue;
use gps_router::{GpsRouter, MissionOutcome, StatsStore};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::context::{PipelineContext, ProviderContribution};
use crate::error::EnrichmentError;
use crate::station::{Station, StationOutcome};

const REQUIRED: &[FieldKey] = &[FieldKey::FirstName, FieldKey::LastName, FieldKey::City, FieldKey::State];
const PRODUCED: &[FieldKey] = &[FieldKey::Phone, FieldKey::Age, FieldKey::Income, FieldKey::Address, FieldKey::Email];

fn lead_from_bag(bag: &FieldBag, canonical_url: String) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        name: bag.get_str(FieldKey::Name).map(String::from),
        first_name: bag.get_str(FieldKey::FirstName).map(String::from),
        last_name: bag.get_str(FieldKey::LastName).map(String::from),
        city: bag.get_str(FieldKey::City).map(String::from),
        state: bag.get_str(FieldKey::State).map(String::from),
        zipcode: bag.get_str(FieldKey::Zipcode).map(String::from),
        employer: bag.get_str(FieldKey::Company).map(String::from),
        title: bag.get_str(FieldKey::Title).map(String::from),
        canonical_url,
    }
}

/// Dispatches a scrape mission to the worker fleet over the shared Redis
/// queue and waits for its result (SPEC_FULL.md §4.2/§4.3). This is the
/// Mission Dispatcher's client side; the worker process lives in
/// `chimera-body`.
pub struct ScraperEnrichmentStation<S: StatsStore> {
    gps: Arc<GpsRouter<S>>,
    queue: Arc<MissionQueue>,
    result_timeout_s: u64,
}

impl<S: StatsStore> ScraperEnrichmentStation<S> {
    pub fn new(gps: Arc<GpsRouter<S>>, queue: Arc<MissionQueue>, result_timeout_s: u64) -> Self {
        Self { gps, queue, result_timeout_s }
    }
}

#[async_trait]
impl<S: StatsStore + 'static> Station for ScraperEnrichmentStation<S> {
    fn name(&self) -> &str {
        "scraper_enrichment"
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
        let canonical_url = ctx.bag.get_str(FieldKey::LinkedinUrl).unwrap_or_default().to_string();
        let lead = lead_from_bag(&ctx.bag, canonical_url);
        let state = lead.state.clone();

        let provider = match ctx.bag.extras.get("_provider").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => self
                .gps
                .select(state.as_deref(), &HashSet::new(), None)
                .await
                .map_err(|e| EnrichmentError::new(self.name(), e.to_string()))?,
        };

        let mut mission = Mission::new(lead, provider.clone());
        if let Some(raw) = ctx.bag.get(FieldKey::Blueprint) {
            if let Ok(blueprint) = serde_json::from_value::<Blueprint>(raw.clone()) {
                mission.blueprint = Some(blueprint);
            }
        }
        let mission_id = mission.mission_id.clone();

        self.queue
            .push_mission(&mission)
            .await
            .map_err(|e| EnrichmentError::new(self.name(), format!("failed to dispatch mission: {e}")))?;

        let result = self
            .queue
            .pop_result(&mission_id, self.result_timeout_s as f64)
            .await
            .map_err(|e| {
                EnrichmentError::new(self.name(), format!("no mission result received: {e}"))
                    .with_fix("check chimera-body worker fleet availability")
            })?;

        let mut datatypes: Vec<&str> = Vec::new();
        if result.extracted.phone.is_some() {
            datatypes.push("phone");
        }
        if result.extracted.age.is_some() {
            datatypes.push("age");
        }
        if result.extracted.income.is_some() {
            datatypes.push("income");
        }

        let outcome = MissionOutcome {
            provider: &provider,
            success: matches!(result.status, MissionStatus::Completed),
            captcha_encountered: result.captcha_faced,
            latency_ms: (result.duration_s.max(0.0) * 1000.0) as u64,
            state: state.as_deref(),
            datatypes_found: &datatypes,
        };
        if let Err(err) = self.gps.record_result(&outcome).await {
            warn!(error = %err, provider, "failed to record mission outcome with GPS");
        }

        let mut fields = FieldBag::default();
        if let Some(v) = &result.extracted.phone {
            fields.set(FieldKey::Phone, json!(v));
        }
        if let Some(v) = result.extracted.age {
            fields.set(FieldKey::Age, json!(v));
        }
        if let Some(v) = result.extracted.income {
            fields.set(FieldKey::Income, json!(v));
        }
        if let Some(v) = &result.extracted.address {
            fields.set(FieldKey::Address, json!(v));
        }
        if let Some(v) = &result.extracted.email {
            fields.set(FieldKey::Email, json!(v));
        }

        let weight = self.gps.provider_weight(&provider).await.unwrap_or(0.5);
        let contribution = ProviderContribution { provider, weight, fields: fields.clone() };

        Ok(StationOutcome::continue_with(fields).with_contribution(contribution))
    }
}
