use chimera_common::{FieldBag, Lead, StopCondition};
use chrono::{DateTime, Utc};

use crate::error::EnrichmentError;

/// What the engine recorded for one station's attempt (SPEC_FULL.md §4.1
/// step 4: "append history entry {station, started_at, duration_ms,
/// status, condition, error?, suggested_fix?}").
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub station: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: StationStatus,
    pub condition: Option<StopCondition>,
    pub error: Option<EnrichmentError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationStatus {
    Completed,
    MissingInputs,
    BudgetExceeded,
    Failed,
}

impl HistoryEntry {
    pub fn missing_inputs(station: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            station: station.to_string(),
            started_at,
            duration_ms: 0,
            status: StationStatus::MissingInputs,
            condition: None,
            error: Some(EnrichmentError::new(station, "missing_inputs")),
        }
    }

    pub fn budget_exceeded(station: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            station: station.to_string(),
            started_at,
            duration_ms: 0,
            status: StationStatus::BudgetExceeded,
            condition: Some(StopCondition::SkipRemaining),
            error: Some(EnrichmentError::new(station, "budget_exceeded")),
        }
    }

    pub fn completed(station: &str, started_at: DateTime<Utc>, duration_ms: u64, condition: StopCondition) -> Self {
        Self {
            station: station.to_string(),
            started_at,
            duration_ms,
            status: StationStatus::Completed,
            condition: Some(condition),
            error: None,
        }
    }

    pub fn failed(station: &str, started_at: DateTime<Utc>, duration_ms: u64, error: EnrichmentError) -> Self {
        Self {
            station: station.to_string(),
            started_at,
            duration_ms,
            status: StationStatus::Failed,
            condition: Some(StopCondition::Fail),
            error: Some(error),
        }
    }
}

/// A source-enrichment station's output, tagged with the provider's GPS
/// weight, kept alongside the merged bag so Persist can hand the full set
/// to `reconciler::reconcile` (SPEC_FULL.md §4.9). Merging a station's own
/// fields into `ctx.bag` immediately still satisfies the per-station
/// output invariant; this is additional bookkeeping for the cross-provider
/// merge, not a replacement for it.
#[derive(Debug, Clone)]
pub struct ProviderContribution {
    pub provider: String,
    pub weight: f64,
    pub fields: FieldBag,
}

/// One lead's journey through the station graph (SPEC_FULL.md §3). Owned
/// exclusively by the engine executing it; never shared across leads.
pub struct PipelineContext {
    pub bag: FieldBag,
    pub running_cost: f64,
    pub budget: f64,
    pub history: Vec<HistoryEntry>,
    pub errors: Vec<EnrichmentError>,
    pub provider_contributions: Vec<ProviderContribution>,
}

impl PipelineContext {
    pub fn new(lead: &Lead, budget: f64) -> Self {
        Self {
            bag: lead.seed_fields(),
            running_cost: 0.0,
            budget,
            history: vec![],
            errors: vec![],
            provider_contributions: vec![],
        }
    }

    pub fn stations_executed(&self) -> usize {
        self.history.iter().filter(|h| h.status == StationStatus::Completed).count()
    }
}
