use chimera_common::Blueprint;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::Result;

const ALERTS_CHANNEL: &str = "dojo:alerts";

fn primary_key(domain: &str) -> String {
    format!("BLUEPRINT:{domain}")
}

fn fallback_key(domain: &str) -> String {
    format!("blueprint:{domain}")
}

/// Redis-backed site blueprint lookup for the Blueprint Loader station.
///
/// Each key holds a hash with a `data` field carrying the JSON blueprint.
/// Absence of both the primary and fallback key publishes a
/// `mapping_required` alert rather than failing the station (SPEC_FULL.md
/// §4.1: Blueprint Loader never FAILs).
pub struct BlueprintStore {
    connection_manager: ConnectionManager,
}

impl BlueprintStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| crate::error::QueueError::Connection(e.to_string()))?;
        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| crate::error::QueueError::Connection(e.to_string()))?;
        Ok(Self { connection_manager })
    }

    pub fn from_connection_manager(connection_manager: ConnectionManager) -> Self {
        Self { connection_manager }
    }

    /// Fetch the blueprint for `domain`, checking `BLUEPRINT:<domain>` then
    /// falling back to `blueprint:<domain>`. Publishes a `mapping_required`
    /// alert and returns `None` if neither exists.
    pub async fn get(&self, domain: &str) -> Result<Option<Blueprint>> {
        let mut conn = self.connection_manager.clone();
        for key in [primary_key(domain), fallback_key(domain)] {
            let raw: Option<String> = conn.hget(&key, "data").await?;
            if let Some(raw) = raw {
                return Ok(Some(serde_json::from_str(&raw)?));
            }
        }
        self.publish_mapping_required(domain).await?;
        Ok(None)
    }

    pub async fn put(&self, blueprint: &Blueprint) -> Result<()> {
        let payload = serde_json::to_string(blueprint)?;
        let mut conn = self.connection_manager.clone();
        conn.hset::<_, _, _, ()>(primary_key(&blueprint.domain), "data", payload)
            .await?;
        Ok(())
    }

    async fn publish_mapping_required(&self, domain: &str) -> Result<()> {
        warn!(domain, "no blueprint mapped; publishing mapping_required alert");
        let payload = serde_json::json!({ "type": "mapping_required", "domain": domain }).to_string();
        let mut conn = self.connection_manager.clone();
        conn.publish::<_, _, ()>(ALERTS_CHANNEL, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_primary_then_fallback_convention() {
        assert_eq!(primary_key("example.com"), "BLUEPRINT:example.com");
        assert_eq!(fallback_key("example.com"), "blueprint:example.com");
    }
}
