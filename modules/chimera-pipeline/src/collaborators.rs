//! Capability traits over the third-party APIs SPEC_FULL.md §1 names as
//! out of scope ("census, carrier lookup, DNC registry ... third-party API
//! clients"). Stations depend on these narrow traits rather than a
//! concrete HTTP client, matching the dependency-injection seam
//! `rootsignal-scout::pipeline::traits::ContentFetcher` uses for its own
//! out-of-process collaborators (`Archive`). No production implementation
//! ships here; a deployment wires in a concrete client per provider.

use async_trait::async_trait;

pub use crate::error::CollaboratorError;

#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub first_name: String,
    pub last_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a display name into structured identity fields. `None`
    /// means the name could not be matched to a person record.
    async fn resolve(&self, name: &str) -> Result<Option<IdentityRecord>, CollaboratorError>;
}

#[derive(Debug, Clone, Default)]
pub struct PhoneValidation {
    pub is_valid: bool,
    pub is_mobile: bool,
    pub is_voip: bool,
    pub is_landline: bool,
    pub carrier: Option<String>,
    pub is_junk: bool,
}

#[async_trait]
pub trait PhoneValidator: Send + Sync {
    async fn validate(&self, phone: &str) -> Result<PhoneValidation, CollaboratorError>;
}

#[derive(Debug, Clone, Default)]
pub struct DncCheck {
    pub dnc_status: bool,
    pub can_contact: bool,
}

#[async_trait]
pub trait DncRegistry: Send + Sync {
    async fn check(&self, phone: &str) -> Result<DncCheck, CollaboratorError>;
}

#[derive(Debug, Clone, Default)]
pub struct SkipTraceResult {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[async_trait]
pub trait SkipTraceProvider: Send + Sync {
    async fn trace(
        &self,
        first_name: &str,
        last_name: &str,
        city: &str,
        state: &str,
    ) -> Result<SkipTraceResult, CollaboratorError>;
}

#[derive(Debug, Clone, Default)]
pub struct DemographicsRecord {
    pub income: Option<i64>,
    pub income_range: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
}

#[async_trait]
pub trait DemographicsProvider: Send + Sync {
    async fn lookup(&self, zipcode: &str) -> Result<DemographicsRecord, CollaboratorError>;
}
