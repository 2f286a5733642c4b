use std::sync::Arc;

use async_trait::async_trait;
use chimera_common::{FieldBag, FieldKey};
use serde_json::json;

use crate::collaborators::SkipTraceProvider;
use crate::context::PipelineContext;
use crate::error::EnrichmentError;
use crate::station::{Station, StationOutcome};

const REQUIRED: &[FieldKey] = &[FieldKey::FirstName, FieldKey::LastName, FieldKey::City, FieldKey::State];
const PRODUCED: &[FieldKey] = &[FieldKey::Phone, FieldKey::Email];
const COST: f64 = 0.15;

/// Falls back to a paid skip-trace lookup when the scraper couldn't
/// produce a phone number. A no-op pass-through when phone is already
/// present, so the budget is only spent when the record actually needs it.
pub struct SkipTracingFallbackStation {
    provider: Arc<dyn SkipTraceProvider>,
}

impl SkipTracingFallbackStation {
    pub fn new(provider: Arc<dyn SkipTraceProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Station for SkipTracingFallbackStation {
    fn name(&self) -> &str {
        "skip_tracing_fallback"
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
        if ctx.bag.contains(FieldKey::Phone) {
            return Ok(StationOutcome::continue_with(FieldBag::default()));
        }

        let first = ctx.bag.get_str(FieldKey::FirstName).unwrap_or_default();
        let last = ctx.bag.get_str(FieldKey::LastName).unwrap_or_default();
        let city = ctx.bag.get_str(FieldKey::City).unwrap_or_default();
        let state = ctx.bag.get_str(FieldKey::State).unwrap_or_default();

        let result = self
            .provider
            .trace(first, last, city, state)
            .await
            .map_err(|e| EnrichmentError::new(self.name(), e.to_string()))?;

        let phone = result.phone.ok_or_else(|| {
            EnrichmentError::new(self.name(), "skip trace returned no phone number")
                .with_fix("try a secondary skip-trace vendor or mark the lead unreachable")
        })?;

        let mut fields = FieldBag::default();
        fields.set(FieldKey::Phone, json!(phone));
        if let Some(email) = result.email {
            fields.set(FieldKey::Email, json!(email));
        }

        Ok(StationOutcome::continue_with(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CollaboratorError, SkipTraceResult};
    use chimera_common::Lead;
    use uuid::Uuid;

    struct StubSkipTrace(Result<SkipTraceResult, &'static str>);

    #[async_trait]
    impl SkipTraceProvider for StubSkipTrace {
        async fn trace(&self, _f: &str, _l: &str, _c: &str, _s: &str) -> Result<SkipTraceResult, CollaboratorError> {
            self.0.clone().map_err(|e| CollaboratorError::Other(e.to_string()))
        }
    }

    fn lead() -> Lead {
        Lead {
            id: Uuid::new_v4(),
            name: Some("Jane Roe".into()),
            first_name: Some("Jane".into()),
            last_name: Some("Roe".into()),
            city: Some("Miami".into()),
            state: Some("FL".into()),
            zipcode: None,
            employer: None,
            title: None,
            canonical_url: "https://example.com/u1".into(),
        }
    }

    #[tokio::test]
    async fn skips_the_external_call_when_phone_already_present() {
        let station = SkipTracingFallbackStation::new(Arc::new(StubSkipTrace(Err("should not be called"))));
        let mut ctx = PipelineContext::new(&lead(), 10.0);
        ctx.bag.set(FieldKey::Phone, json!("555-0100"));
        let outcome = station.process(&ctx).await.unwrap();
        assert!(!outcome.fields.contains(FieldKey::Phone));
    }

    #[tokio::test]
    async fn no_phone_returned_fails_the_station() {
        let station = SkipTracingFallbackStation::new(Arc::new(StubSkipTrace(Ok(SkipTraceResult::default()))));
        let ctx = PipelineContext::new(&lead(), 10.0);
        assert!(station.process(&ctx).await.is_err());
    }
}
