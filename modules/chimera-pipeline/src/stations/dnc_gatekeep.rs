use std::sync::Arc;

use async_trait::async_trait;
use chimera_common::{FieldBag, FieldKey, StopCondition};
use serde_json::json;

use crate::collaborators::DncRegistry;
use crate::context::PipelineContext;
use crate::error::EnrichmentError;
use crate::station::{Station, StationOutcome};

const REQUIRED: &[FieldKey] = &[FieldKey::Phone];
const PRODUCED: &[FieldKey] = &[FieldKey::DncStatus, FieldKey::CanContact];
const COST: f64 = 0.02;

/// Checks the national Do-Not-Call registry and halts enrichment for
/// numbers the golden record must not be used to contact.
pub struct DncGatekeeperStation {
    registry: Arc<dyn DncRegistry>,
}

impl DncGatekeeperStation {
    pub fn new(registry: Arc<dyn DncRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Station for DncGatekeeperStation {
    fn name(&self) -> &str {
        "dnc_gatekeeper"
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
        let check = self
            .registry
            .check(phone)
            .await
            .map_err(|e| EnrichmentError::new(self.name(), e.to_string()))?;

        let mut fields = FieldBag::default();
        fields.set(FieldKey::DncStatus, json!(check.dnc_status));
        fields.set(FieldKey::CanContact, json!(check.can_contact));

        Ok(StationOutcome {
            fields,
            stop: if check.can_contact { StopCondition::Continue } else { StopCondition::SkipRemaining },
            contribution: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CollaboratorError, DncCheck};
    use chimera_common::Lead;
    use uuid::Uuid;

    struct StubRegistry(DncCheck);

    #[async_trait]
    impl DncRegistry for StubRegistry {
        async fn check(&self, _phone: &str) -> Result<DncCheck, CollaboratorError> {
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
            zipcode: None,
            employer: None,
            title: None,
            canonical_url: "https://example.com/u1".into(),
        };
        let mut ctx = PipelineContext::new(&lead, 10.0);
        ctx.bag.set(FieldKey::Phone, json!("555-0100"));
        ctx
    }

    #[tokio::test]
    async fn cannot_contact_skips_remaining() {
        let station = DncGatekeeperStation::new(Arc::new(StubRegistry(DncCheck { dnc_status: true, can_contact: false })));
        let outcome = station.process(&ctx()).await.unwrap();
        assert_eq!(outcome.stop, StopCondition::SkipRemaining);
    }

    #[tokio::test]
    async fn can_contact_continues() {
        let station = DncGatekeeperStation::new(Arc::new(StubRegistry(DncCheck { dnc_status: false, can_contact: true })));
        let outcome = station.process(&ctx()).await.unwrap();
        assert_eq!(outcome.stop, StopCondition::Continue);
    }
}
