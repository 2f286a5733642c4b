use std::sync::Arc;

use async_trait::async_trait;
use chimera_common::{FieldBag, FieldKey, StopCondition};
use serde_json::json;

use crate::collaborators::PhoneValidator;
use crate::context::PipelineContext;
use crate::error::EnrichmentError;
use crate::station::{Station, StationOutcome};

const REQUIRED: &[FieldKey] = &[FieldKey::Phone];
const PRODUCED: &[FieldKey] =
    &[FieldKey::IsValid, FieldKey::IsMobile, FieldKey::IsVoip, FieldKey::IsLandline, FieldKey::Carrier, FieldKey::IsJunk];
const COST: f64 = 0.01;

/// Validates the phone a prior station produced and halts enrichment for
/// numbers that aren't worth contacting (SPEC_FULL.md §4.1): invalid, VOIP,
/// landline, or a known junk carrier.
pub struct PhoneGatekeepStation {
    validator: Arc<dyn PhoneValidator>,
}

impl PhoneGatekeepStation {
    pub fn new(validator: Arc<dyn PhoneValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Station for PhoneGatekeepStation {
    fn name(&self) -> &str {
        "phone_gatekeep"
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
        let phone = ctx.bag.get_str(FieldKey::Phone).unwrap_or_default();
        let validation = self
            .validator
            .validate(phone)
            .await
            .map_err(|e| EnrichmentError::new(self.name(), e.to_string()))?;

        let mut fields = FieldBag::default();
        fields.set(FieldKey::IsValid, json!(validation.is_valid));
        fields.set(FieldKey::IsMobile, json!(validation.is_mobile));
        fields.set(FieldKey::IsVoip, json!(validation.is_voip));
        fields.set(FieldKey::IsLandline, json!(validation.is_landline));
        fields.set(FieldKey::IsJunk, json!(validation.is_junk));
        if let Some(carrier) = &validation.carrier {
            fields.set(FieldKey::Carrier, json!(carrier));
        }

        let worth_contacting =
            validation.is_valid && !validation.is_voip && !validation.is_landline && !validation.is_junk;

        Ok(StationOutcome {
            fields,
            stop: if worth_contacting { StopCondition::Continue } else { StopCondition::SkipRemaining },
            contribution: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CollaboratorError, PhoneValidation};
    use chimera_common::Lead;
    use uuid::Uuid;

    struct StubValidator(PhoneValidation);

    #[async_trait]
    impl PhoneValidator for StubValidator {
        async fn validate(&self, _phone: &str) -> Result<PhoneValidation, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    fn lead() -> Lead {
        Lead {
            id: Uuid::new_v4(),
            name: Some("Jane Roe".into()),
            first_name: None,
            last_name: None,
            city: None,
            state: None,
            zipcode: None,
            employer: None,
            title: None,
            canonical_url: "https://example.com/u1".into(),
        }
    }

    fn ctx_with_phone() -> PipelineContext {
        let mut ctx = PipelineContext::new(&lead(), 10.0);
        ctx.bag.set(FieldKey::Phone, json!("555-0100"));
        ctx
    }

    #[tokio::test]
    async fn valid_mobile_number_continues() {
        let station = PhoneGatekeepStation::new(Arc::new(StubValidator(PhoneValidation {
            is_valid: true,
            is_mobile: true,
            ..Default::default()
        })));
        let outcome = station.process(&ctx_with_phone()).await.unwrap();
        assert_eq!(outcome.stop, StopCondition::Continue);
    }

    #[tokio::test]
    async fn voip_number_skips_remaining() {
        let station = PhoneGatekeepStation::new(Arc::new(StubValidator(PhoneValidation {
            is_valid: true,
            is_voip: true,
            ..Default::default()
        })));
        let outcome = station.process(&ctx_with_phone()).await.unwrap();
        assert_eq!(outcome.stop, StopCondition::SkipRemaining);
    }

    #[tokio::test]
    async fn invalid_number_skips_remaining() {
        let station = PhoneGatekeepStation::new(Arc::new(StubValidator(PhoneValidation::default())));
        let outcome = station.process(&ctx_with_phone()).await.unwrap();
        assert_eq!(outcome.stop, StopCondition::SkipRemaining);
    }
}
