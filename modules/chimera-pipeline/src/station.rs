use async_trait::async_trait;
use chimera_common::{FieldBag, FieldKey, StopCondition};

use crate::context::{PipelineContext, ProviderContribution};
use crate::error::EnrichmentError;

/// A station's result on success: new fields to merge plus the stop
/// condition to apply (SPEC_FULL.md §4.1 step 3: "Station returns
/// (new-fields, stop-condition)"). A source-enrichment station also
/// attaches its [`ProviderContribution`] so Persist can reconcile across
/// providers later (SPEC_FULL.md §4.9).
pub struct StationOutcome {
    pub fields: FieldBag,
    pub stop: StopCondition,
    pub contribution: Option<ProviderContribution>,
}

impl StationOutcome {
    pub fn continue_with(fields: FieldBag) -> Self {
        Self { fields, stop: StopCondition::Continue, contribution: None }
    }

    pub fn skip_remaining(fields: FieldBag) -> Self {
        Self { fields, stop: StopCondition::SkipRemaining, contribution: None }
    }

    pub fn with_contribution(mut self, contribution: ProviderContribution) -> Self {
        self.contribution = Some(contribution);
        self
    }
}

/// A pipeline stage's immutable contract (SPEC_FULL.md §3 "Station
/// Contract") plus its behavior. Concrete stations are values behind this
/// trait object, not a class hierarchy (SPEC_FULL.md §9).
#[async_trait]
pub trait Station: Send + Sync {
    fn name(&self) -> &str;
    fn required_inputs(&self) -> &[FieldKey];
    fn produces_outputs(&self) -> &[FieldKey];
    fn cost_estimate(&self) -> f64;

    async fn process(&self, ctx: &PipelineContext) -> Result<StationOutcome, EnrichmentError>;
}
