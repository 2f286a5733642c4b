use crate::error::Result;
use crate::scoring::{ProviderStats, StateStats};
use async_trait::async_trait;
use std::collections::HashMap;

/// Everything recorded about one completed mission, passed to
/// [`StatsStore::record_result`] in a single call (SPEC_FULL.md §4.3
/// "Recording").
pub struct MissionOutcome<'a> {
    pub provider: &'a str,
    pub success: bool,
    pub captcha_encountered: bool,
    pub latency_ms: u64,
    pub state: Option<&'a str>,
    /// Subset of `{"phone", "age", "income"}` actually extracted; latency is
    /// distributed evenly across them for the per-datatype stats.
    pub datatypes_found: &'a [&'a str],
}

/// Abstraction over the Redis-hash-backed provider/state/datatype/carrier
/// statistics, so `GpsRouter`'s selection logic can be tested without Redis.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn provider_stats(&self, provider: &str) -> Result<ProviderStats>;
    async fn state_stats(&self, state: &str, provider: &str) -> Result<StateStats>;
    async fn record_result(&self, outcome: &MissionOutcome<'_>) -> Result<()>;

    async fn is_blacklisted(&self, provider: &str) -> Result<bool>;
    async fn blacklist(&self, provider: &str) -> Result<()>;

    /// (success, failure) per carrier for this domain.
    async fn carrier_health(&self, domain: &str) -> Result<HashMap<String, (u64, u64)>>;
    async fn record_carrier_result(&self, domain: &str, carrier: &str, success: bool) -> Result<()>;
}

pub struct RedisStatsStore {
    connection_manager: redis::aio::ConnectionManager,
}

impl RedisStatsStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| crate::error::GpsError::Command(e.to_string()))?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { connection_manager })
    }

    pub fn from_connection_manager(connection_manager: redis::aio::ConnectionManager) -> Self {
        Self { connection_manager }
    }

    fn provider_key(provider: &str) -> String {
        format!("gps:provider:{provider}")
    }

    fn state_key(state: &str, provider: &str) -> String {
        format!("gps:state:{state}:{provider}")
    }

    fn datatype_key(datatype: &str, provider: &str) -> String {
        format!("gps:datatype:{datatype}:{provider}")
    }

    fn carrier_health_key(domain: &str) -> String {
        format!("carrier_health:{domain}")
    }

    fn blacklist_key() -> &'static str {
        "gps:blacklist"
    }
}

#[async_trait]
impl StatsStore for RedisStatsStore {
    async fn provider_stats(&self, provider: &str) -> Result<ProviderStats> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        let fields: HashMap<String, u64> = conn.hgetall(Self::provider_key(provider)).await?;
        Ok(ProviderStats {
            success_count: fields.get("success_count").copied().unwrap_or(0),
            failure_count: fields.get("failure_count").copied().unwrap_or(0),
            captcha_count: fields.get("captcha_count").copied().unwrap_or(0),
            total_latency_ms: fields.get("total_latency_ms").copied().unwrap_or(0),
        })
    }

    async fn state_stats(&self, state: &str, provider: &str) -> Result<StateStats> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        let fields: HashMap<String, u64> = conn.hgetall(Self::state_key(state, provider)).await?;
        Ok(StateStats {
            success_count: fields.get("success_count").copied().unwrap_or(0),
            failure_count: fields.get("failure_count").copied().unwrap_or(0),
        })
    }

    async fn record_result(&self, outcome: &MissionOutcome<'_>) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        let provider_key = Self::provider_key(outcome.provider);

        if outcome.success {
            conn.hincr::<_, _, _, ()>(&provider_key, "success_count", 1).await?;
        } else {
            conn.hincr::<_, _, _, ()>(&provider_key, "failure_count", 1).await?;
        }
        if outcome.captcha_encountered {
            conn.hincr::<_, _, _, ()>(&provider_key, "captcha_count", 1).await?;
        }
        conn.hincr::<_, _, _, ()>(&provider_key, "total_latency_ms", outcome.latency_ms)
            .await?;

        if let Some(state) = outcome.state {
            let state_key = Self::state_key(state, outcome.provider);
            let field = if outcome.success { "success_count" } else { "failure_count" };
            conn.hincr::<_, _, _, ()>(&state_key, field, 1).await?;
        }

        if !outcome.datatypes_found.is_empty() {
            let per_datatype_latency = outcome.latency_ms / outcome.datatypes_found.len() as u64;
            for datatype in outcome.datatypes_found {
                let key = Self::datatype_key(datatype, outcome.provider);
                conn.hincr::<_, _, _, ()>(&key, "total_latency_ms", per_datatype_latency).await?;
                conn.hincr::<_, _, _, ()>(&key, "count", 1).await?;
            }
        }

        Ok(())
    }

    async fn is_blacklisted(&self, provider: &str) -> Result<bool> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        Ok(conn.sismember(Self::blacklist_key(), provider).await?)
    }

    async fn blacklist(&self, provider: &str) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        conn.sadd::<_, _, ()>(Self::blacklist_key(), provider).await?;
        Ok(())
    }

    async fn carrier_health(&self, domain: &str) -> Result<HashMap<String, (u64, u64)>> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        let raw: HashMap<String, String> = conn.hgetall(Self::carrier_health_key(domain)).await?;
        Ok(raw
            .into_iter()
            .filter_map(|(carrier, value)| {
                let mut parts = value.splitn(2, ',');
                let success: u64 = parts.next()?.parse().ok()?;
                let failure: u64 = parts.next()?.parse().ok()?;
                Some((carrier, (success, failure)))
            })
            .collect())
    }

    async fn record_carrier_result(&self, domain: &str, carrier: &str, success: bool) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        let key = Self::carrier_health_key(domain);
        let current: Option<String> = conn.hget(&key, carrier).await?;
        let (mut s, mut f) = (0u64, 0u64);
        if let Some(v) = current {
            let mut parts = v.splitn(2, ',');
            s = parts.next().and_then(|x| x.parse().ok()).unwrap_or(0);
            f = parts.next().and_then(|x| x.parse().ok()).unwrap_or(0);
        }
        if success {
            s += 1;
        } else {
            f += 1;
        }
        conn.hset::<_, _, _, ()>(&key, carrier, format!("{s},{f}")).await?;
        Ok(())
    }
}
