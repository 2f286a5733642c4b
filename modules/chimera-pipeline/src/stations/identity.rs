use std::sync::Arc;

use async_trait::async_trait;
use chimera_common::{FieldBag, FieldKey};
use serde_json::json;

use crate::collaborators::IdentityProvider;
use crate::context::PipelineContext;
use crate::error::EnrichmentError;
use crate::station::{Station, StationOutcome};

const REQUIRED: &[FieldKey] = &[FieldKey::Name];
const PRODUCED: &[FieldKey] = &[
    FieldKey::FirstName,
    FieldKey::LastName,
    FieldKey::City,
    FieldKey::State,
    FieldKey::Zipcode,
    FieldKey::LinkedinUrl,
    FieldKey::Company,
    FieldKey::Title,
];

/// Resolves a bare name into structured identity fields before any
/// scraping happens. First station in the graph: every later station's
/// required inputs ultimately trace back to its output.
pub struct IdentityResolutionStation {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityResolutionStation {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Station for IdentityResolutionStation {
    fn name(&self) -> &str {
        "identity_resolution"
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
        let name = ctx.bag.get_str(FieldKey::Name).unwrap_or_default();

        let record = self
            .provider
            .resolve(name)
            .await
            .map_err(|e| EnrichmentError::new(self.name(), e.to_string()))?
            .ok_or_else(|| {
                EnrichmentError::new(self.name(), format!("no identity match for '{name}'"))
                    .with_fix("verify the lead's name is spelled correctly and try again")
            })?;

        let mut fields = FieldBag::default();
        fields.set(FieldKey::FirstName, json!(record.first_name));
        fields.set(FieldKey::LastName, json!(record.last_name));
        if let Some(v) = record.city {
            fields.set(FieldKey::City, json!(v));
        }
        if let Some(v) = record.state {
            fields.set(FieldKey::State, json!(v));
        }
        if let Some(v) = record.zipcode {
            fields.set(FieldKey::Zipcode, json!(v));
        }
        if let Some(v) = record.company {
            fields.set(FieldKey::Company, json!(v));
        }
        if let Some(v) = record.title {
            fields.set(FieldKey::Title, json!(v));
        }

        Ok(StationOutcome::continue_with(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::IdentityRecord;
    use crate::error::CollaboratorError;
    use chimera_common::Lead;
    use uuid::Uuid;

    struct StubIdentity(Option<IdentityRecord>);

    #[async_trait]
    impl IdentityProvider for StubIdentity {
        async fn resolve(&self, _name: &str) -> Result<Option<IdentityRecord>, CollaboratorError> {
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

    #[tokio::test]
    async fn resolves_identity_into_structured_fields() {
        let station = IdentityResolutionStation::new(Arc::new(StubIdentity(Some(IdentityRecord {
            first_name: "Jane".into(),
            last_name: "Roe".into(),
            city: Some("Miami".into()),
            state: Some("FL".into()),
            zipcode: Some("33101".into()),
            company: None,
            title: None,
        }))));
        let ctx = PipelineContext::new(&lead(), 10.0);
        let outcome = station.process(&ctx).await.unwrap();
        assert_eq!(outcome.fields.get_str(FieldKey::FirstName), Some("Jane"));
        assert_eq!(outcome.fields.get_str(FieldKey::City), Some("Miami"));
    }

    #[tokio::test]
    async fn no_match_fails_the_station() {
        let station = IdentityResolutionStation::new(Arc::new(StubIdentity(None)));
        let ctx = PipelineContext::new(&lead(), 10.0);
        assert!(station.process(&ctx).await.is_err());
    }
}
