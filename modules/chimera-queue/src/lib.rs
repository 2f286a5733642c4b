pub mod blueprint;
pub mod cookies;
pub mod error;
pub mod forbidden;

pub use blueprint::BlueprintStore;
pub use cookies::{CookieMeta, CookieRecord, CookieStore};
pub use error::{QueueError, Result};
pub use forbidden::{ForbiddenRect, ForbiddenRegions, ForbiddenRegionsStore};

use chimera_common::{Mission, MissionResult};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};

const MISSIONS_KEY: &str = "chimera:missions";

fn results_key(mission_id: &str) -> String {
    format!("chimera:results:{mission_id}")
}

/// Redis-backed mission queue plus per-mission result channel
/// (SPEC_FULL.md §6: "Producers push left, workers pop right (blocking)").
pub struct MissionQueue {
    connection_manager: ConnectionManager,
}

impl MissionQueue {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| QueueError::Connection(e.to_string()))?;
        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        debug!("connected to Redis mission queue");
        Ok(Self { connection_manager })
    }

    pub fn from_connection_manager(connection_manager: ConnectionManager) -> Self {
        Self { connection_manager }
    }

    /// Push a mission onto the shared queue. Producers push left.
    pub async fn push_mission(&self, mission: &Mission) -> Result<()> {
        let payload = serde_json::to_string(mission)?;
        let mut conn = self.connection_manager.clone();
        conn.lpush::<_, _, ()>(MISSIONS_KEY, payload).await?;
        Ok(())
    }

    /// Block (up to `timeout_s`) waiting for a mission, popping from the
    /// right. Returns `None` on timeout so callers can loop and check for
    /// shutdown signals between waits.
    pub async fn pop_mission(&self, timeout_s: f64) -> Result<Option<Mission>> {
        let mut conn = self.connection_manager.clone();
        let raw: Option<(String, String)> = conn.brpop(MISSIONS_KEY, timeout_s).await?;
        match raw {
            Some((_, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Push this worker's completed mission result onto its dedicated
    /// per-mission list.
    pub async fn push_result(&self, mission_id: &str, result: &MissionResult) -> Result<()> {
        let payload = serde_json::to_string(result)?;
        let mut conn = self.connection_manager.clone();
        conn.lpush::<_, _, ()>(results_key(mission_id), payload).await?;
        Ok(())
    }

    /// Block (up to `timeout_s`) waiting for a mission's result.
    pub async fn pop_result(&self, mission_id: &str, timeout_s: f64) -> Result<MissionResult> {
        let mut conn = self.connection_manager.clone();
        let raw: Option<(String, String)> = conn.brpop(results_key(mission_id), timeout_s).await?;
        match raw {
            Some((_, payload)) => Ok(serde_json::from_str(&payload)?),
            None => {
                warn!(mission_id, timeout_s, "result channel timed out");
                Err(QueueError::Timeout(timeout_s as u64))
            }
        }
    }

    /// Approximate queue depth, for health/metrics reporting.
    pub async fn mission_queue_depth(&self) -> Result<u64> {
        let mut conn = self.connection_manager.clone();
        Ok(conn.llen(MISSIONS_KEY).await?)
    }
}

/// Helper for the worker side: build the timeout used by `pop_result`'s
/// caller (the pipeline's Mission Dispatcher station) from a configured
/// `smoke_results_timeout_s`.
pub fn result_wait_timeout(configured_s: u64) -> Duration {
    Duration::from_secs(configured_s.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_key_is_namespaced_per_mission() {
        assert_eq!(results_key("abc-123"), "chimera:results:abc-123");
    }

    #[test]
    fn result_wait_timeout_floors_at_one_second() {
        assert_eq!(result_wait_timeout(0), Duration::from_secs(1));
        assert_eq!(result_wait_timeout(30), Duration::from_secs(30));
    }
}
