use std::sync::Arc;

use async_trait::async_trait;
use chimera_common::{FieldBag, FieldKey};
use serde_json::json;
use tracing::warn;

use crate::collaborators::{DemographicsProvider, DemographicsRecord};
use crate::context::PipelineContext;
use crate::error::EnrichmentError;
use crate::station::{Station, StationOutcome};

const REQUIRED: &[FieldKey] = &[FieldKey::Zipcode];
const PRODUCED: &[FieldKey] = &[FieldKey::Income, FieldKey::IncomeRange, FieldKey::Age, FieldKey::Address];
const COST: f64 = 0.01;

/// Census-style demographic lookup, used to fill in age/income/address
/// when the scraper didn't return them. Never halts the pipeline: a
/// lookup error just leaves those fields unset (SPEC_FULL.md §4.1).
pub struct DemographicsStation {
    provider: Arc<dyn DemographicsProvider>,
}

impl DemographicsStation {
    pub fn new(provider: Arc<dyn DemographicsProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Station for DemographicsStation {
    fn name(&self) -> &str {
        "demographics"
    }

    fn required_inputs(&self) -> &[FieldKey] {
        REQUIRED
    }

    fn produces_outputs(&self) -> &[FieldKey] {
        PRODUCED
    }

    fn cost_estimate(&self) -> f64 {
        COST
    }

    async fn process(&self, ctx: &PipelineContext) -> Result<StationOutcome, EnrichmentError> {
        let zipcode = ctx.bag.get_str(FieldKey::Zipcode).unwrap_or_default();
        let mut fields = FieldBag::default();

        match self.provider.lookup(zipcode).await {
            Ok(record) => {
                if !ctx.bag.contains(FieldKey::Income) {
                    if let Some(v) = record.income {
                        fields.set(FieldKey::Income, json!(v));
                    }
                }
                if let Some(v) = record.income_range {
                    fields.set(FieldKey::IncomeRange, json!(v));
                }
                if !ctx.bag.contains(FieldKey::Age) {
                    if let Some(v) = record.age {
                        fields.set(FieldKey::Age, json!(v));
                    }
                }
                if !ctx.bag.contains(FieldKey::Address) {
                    if let Some(v) = record.address {
                        fields.set(FieldKey::Address, json!(v));
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, zipcode, "demographics lookup failed, continuing without it");
            }
        }

        Ok(StationOutcome::continue_with(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorError;
    use chimera_common::Lead;
    use uuid::Uuid;

    struct StubDemographics(DemographicsRecord);

    #[async_trait]
    impl DemographicsProvider for StubDemographics {
        async fn lookup(&self, _zipcode: &str) -> Result<DemographicsRecord, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    fn ctx() -> PipelineContext {
        let lead = Lead {
            id: Uuid::new_v4(),
            name: None,
            first_name: None,
            last_name: None,
            city: None,
            state: None,
            zipcode: Some("33101".into()),
            employer: None,
            title: None,
            canonical_url: "https://example.com/u1".into(),
        };
        PipelineContext::new(&lead, 10.0)
    }

    #[tokio::test]
    async fn fills_in_missing_demographic_fields() {
        let station = DemographicsStation::new(Arc::new(StubDemographics(DemographicsRecord {
            income: Some(75_000),
            income_range: Some("$50k-$100k".into()),
            age: Some(41),
            address: Some("123 Main St".into()),
        })));
        let outcome = station.process(&ctx()).await.unwrap();
        assert_eq!(outcome.fields.get(FieldKey::Income), Some(&json!(75_000)));
        assert_eq!(outcome.fields.get_str(FieldKey::Address), Some("123 Main St"));
    }

    #[tokio::test]
    async fn does_not_overwrite_an_income_the_scraper_already_found() {
        let mut ctx = ctx();
        ctx.bag.set(FieldKey::Income, json!(120_000));
        let station = DemographicsStation::new(Arc::new(StubDemographics(DemographicsRecord {
            income: Some(40_000),
            ..Default::default()
        })));
        let outcome = station.process(&ctx).await.unwrap();
        assert!(!outcome.fields.contains(FieldKey::Income));
    }

    #[tokio::test]
    async fn lookup_failure_leaves_fields_empty_without_erroring() {
        struct Failing;
        #[async_trait]
        impl DemographicsProvider for Failing {
            async fn lookup(&self, _zipcode: &str) -> Result<DemographicsRecord, CollaboratorError> {
                Err(CollaboratorError::Other("census API down".into()))
            }
        }
        let station = DemographicsStation::new(Arc::new(Failing));
        let outcome = station.process(&ctx()).await.unwrap();
        assert!(!outcome.fields.contains(FieldKey::Age));
    }
}
