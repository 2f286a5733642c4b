use std::sync::Arc;

use async_trait::async_trait;
use chimera_common::{FieldKey, Lead};
use chimera_pipeline::collaborators::{
    CollaboratorError, DncCheck, DncRegistry, IdentityProvider, IdentityRecord, PhoneValidation, PhoneValidator,
    SkipTraceProvider, SkipTraceResult,
};
use chimera_pipeline::stations::{
    DncGatekeeperStation, IdentityResolutionStation, PhoneGatekeepStation, SkipTracingFallbackStation,
};
use chimera_pipeline::{PipelineEngine, Station};
use uuid::Uuid;

fn lead(name: &str) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        name: Some(name.to_string()),
        first_name: None,
        last_name: None,
        city: None,
        state: None,
        zipcode: None,
        employer: None,
        title: None,
        canonical_url: format!("https://example.com/{name}"),
    }
}

struct StubIdentity {
    city: &'static str,
    state: &'static str,
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn resolve(&self, name: &str) -> Result<Option<IdentityRecord>, CollaboratorError> {
        let mut parts = name.split_whitespace();
        Ok(Some(IdentityRecord {
            first_name: parts.next().unwrap_or("John").to_string(),
            last_name: parts.next().unwrap_or("Doe").to_string(),
            city: Some(self.city.to_string()),
            state: Some(self.state.to_string()),
            zipcode: Some("33101".into()),
            company: None,
            title: None,
        }))
    }
}

struct StubSkipTrace {
    phone: &'static str,
}

#[async_trait]
impl SkipTraceProvider for StubSkipTrace {
    async fn trace(&self, _f: &str, _l: &str, _c: &str, _s: &str) -> Result<SkipTraceResult, CollaboratorError> {
        Ok(SkipTraceResult { phone: Some(self.phone.to_string()), email: None })
    }
}

struct StubPhoneValidator(PhoneValidation);

#[async_trait]
impl PhoneValidator for StubPhoneValidator {
    async fn validate(&self, _phone: &str) -> Result<PhoneValidation, CollaboratorError> {
        Ok(self.0.clone())
    }
}

struct StubDnc(DncCheck);

#[async_trait]
impl DncRegistry for StubDnc {
    async fn check(&self, _phone: &str) -> Result<DncCheck, CollaboratorError> {
        Ok(self.0.clone())
    }
}

/// Happy path: identity -> skip trace -> a valid, contactable mobile number
/// survives both gatekeepers.
#[tokio::test]
async fn happy_path_survives_both_gatekeepers() {
    let stations: Vec<Arc<dyn Station>> = vec![
        Arc::new(IdentityResolutionStation::new(Arc::new(StubIdentity { city: "Miami", state: "FL" }))),
        Arc::new(SkipTracingFallbackStation::new(Arc::new(StubSkipTrace { phone: "555-0100" }))),
        Arc::new(PhoneGatekeepStation::new(Arc::new(StubPhoneValidator(PhoneValidation {
            is_valid: true,
            is_mobile: true,
            ..Default::default()
        })))),
        Arc::new(DncGatekeeperStation::new(Arc::new(StubDnc(DncCheck { dnc_status: false, can_contact: true })))),
    ];
    let engine = PipelineEngine::new(stations);
    let report = engine.run(&lead("Jane Roe"), 10.0).await;

    assert_eq!(report.stations_executed, 4);
    assert_eq!(report.error_count, 0);
    assert_eq!(report.bag.get_str(FieldKey::Phone), Some("555-0100"));
    assert_eq!(report.bag.get_bool(FieldKey::CanContact), Some(true));
}

/// DNC short-circuit: a number on the registry halts before any station
/// downstream of the DNC gatekeeper runs.
#[tokio::test]
async fn dnc_hit_short_circuits_remaining_stations() {
    let stations: Vec<Arc<dyn Station>> = vec![
        Arc::new(IdentityResolutionStation::new(Arc::new(StubIdentity { city: "Austin", state: "TX" }))),
        Arc::new(SkipTracingFallbackStation::new(Arc::new(StubSkipTrace { phone: "555-0199" }))),
        Arc::new(PhoneGatekeepStation::new(Arc::new(StubPhoneValidator(PhoneValidation {
            is_valid: true,
            is_mobile: true,
            ..Default::default()
        })))),
        Arc::new(DncGatekeeperStation::new(Arc::new(StubDnc(DncCheck { dnc_status: true, can_contact: false })))),
    ];
    let engine = PipelineEngine::new(stations);
    let report = engine.run(&lead("Sam Lee"), 10.0).await;

    assert_eq!(report.stations_executed, 4);
    assert_eq!(report.bag.get_bool(FieldKey::CanContact), Some(false));
    assert_eq!(report.history.last().unwrap().station, "dnc_gatekeeper");
}

/// A VOIP number never reaches the DNC gatekeeper at all.
#[tokio::test]
async fn voip_number_skips_dnc_check_entirely() {
    let stations: Vec<Arc<dyn Station>> = vec![
        Arc::new(IdentityResolutionStation::new(Arc::new(StubIdentity { city: "Reno", state: "NV" }))),
        Arc::new(SkipTracingFallbackStation::new(Arc::new(StubSkipTrace { phone: "555-0155" }))),
        Arc::new(PhoneGatekeepStation::new(Arc::new(StubPhoneValidator(PhoneValidation {
            is_valid: true,
            is_voip: true,
            ..Default::default()
        })))),
        Arc::new(DncGatekeeperStation::new(Arc::new(StubDnc(DncCheck { dnc_status: false, can_contact: true })))),
    ];
    let engine = PipelineEngine::new(stations);
    let report = engine.run(&lead("Pat Kim"), 10.0).await;

    assert_eq!(report.stations_executed, 3);
    assert!(!report.bag.contains(FieldKey::CanContact));
}

/// A tight budget stops the pipeline before the costed stations can run.
#[tokio::test]
async fn tight_budget_halts_before_costed_stations() {
    let stations: Vec<Arc<dyn Station>> = vec![
        Arc::new(IdentityResolutionStation::new(Arc::new(StubIdentity { city: "Boise", state: "ID" }))),
        Arc::new(SkipTracingFallbackStation::new(Arc::new(StubSkipTrace { phone: "555-0177" }))),
    ];
    let engine = PipelineEngine::new(stations);
    let report = engine.run(&lead("Ana Cruz"), 0.1).await;

    assert_eq!(report.stations_executed, 1);
    assert!(!report.bag.contains(FieldKey::Phone));
    assert_eq!(report.history.last().unwrap().station, "skip_tracing_fallback");
}
