pub mod collaborators;
pub mod context;
pub mod engine;
pub mod error;
pub mod station;
pub mod stations;

pub use context::{HistoryEntry, PipelineContext, ProviderContribution, StationStatus};
pub use engine::{PipelineEngine, PipelineReport};
pub use error::{CollaboratorError, EnrichmentError};
pub use station::{Station, StationOutcome};

/// The concrete GPS router this crate's stations are wired against. GPS is
/// generic over its stats store (SPEC_FULL.md §4.3); the pipeline always
/// runs against the Redis-backed store in production and in integration
/// tests.
pub type Gps = gps_router::GpsRouter<gps_router::RedisStatsStore>;
