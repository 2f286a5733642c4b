pub mod error;
pub mod router;
pub mod scoring;
pub mod stats;

pub use error::{GpsError, Result};
pub use router::GpsRouter;
pub use stats::{MissionOutcome, RedisStatsStore, StatsStore};
