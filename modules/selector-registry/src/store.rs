use async_trait::async_trait;
use chimera_common::{SelectorKind, SelectorRecord};
use chrono::Utc;
use std::collections::HashMap;

use crate::error::Result;

#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn get(&self, domain: &str, intent: &str) -> Result<Option<SelectorRecord>>;
    async fn put(&self, record: &SelectorRecord) -> Result<()>;
    async fn recovery_failure_count(&self, domain: &str, intent: &str) -> Result<u32>;
    async fn increment_recovery_failure(&self, domain: &str, intent: &str) -> Result<u32>;
    async fn reset_recovery_failures(&self, domain: &str, intent: &str) -> Result<()>;
}

pub struct RedisRegistryStore {
    connection_manager: redis::aio::ConnectionManager,
}

impl RedisRegistryStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| crate::error::RegistryError::Redis(e.to_string()))?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { connection_manager })
    }

    pub fn from_connection_manager(connection_manager: redis::aio::ConnectionManager) -> Self {
        Self { connection_manager }
    }

    fn key(domain: &str, intent: &str) -> String {
        format!("selector:{domain}:{intent}")
    }
}

#[async_trait]
impl RegistryStore for RedisRegistryStore {
    async fn get(&self, domain: &str, intent: &str) -> Result<Option<SelectorRecord>> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        let fields: HashMap<String, String> = conn.hgetall(Self::key(domain, intent)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let selector_kind = match fields.get("selector_kind").map(String::as_str) {
            Some("xpath") => SelectorKind::Xpath,
            _ => SelectorKind::Css,
        };
        Ok(Some(SelectorRecord {
            domain: domain.to_string(),
            intent: intent.to_string(),
            selector: fields.get("selector").cloned().unwrap_or_default(),
            selector_kind,
            confidence: fields.get("confidence").and_then(|v| v.parse().ok()).unwrap_or(0.0),
            last_used: fields
                .get("last_used")
                .and_then(|v| v.parse::<chrono::DateTime<Utc>>().ok())
                .unwrap_or_else(Utc::now),
            consecutive_failures: fields
                .get("consecutive_failures")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            metadata: fields
                .get("metadata")
                .and_then(|v| serde_json::from_str(v).ok())
                .unwrap_or(serde_json::Value::Null),
        }))
    }

    async fn put(&self, record: &SelectorRecord) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        let kind = match record.selector_kind {
            SelectorKind::Css => "css",
            SelectorKind::Xpath => "xpath",
        };
        let entries: Vec<(&str, String)> = vec![
            ("selector", record.selector.clone()),
            ("selector_kind", kind.to_string()),
            ("confidence", record.confidence.to_string()),
            ("last_used", record.last_used.to_rfc3339()),
            ("consecutive_failures", record.consecutive_failures.to_string()),
            ("metadata", record.metadata.to_string()),
        ];
        conn.hset_multiple::<_, _, _, ()>(Self::key(&record.domain, &record.intent), &entries)
            .await?;
        Ok(())
    }

    async fn recovery_failure_count(&self, domain: &str, intent: &str) -> Result<u32> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        let v: Option<u32> = conn.hget(Self::key(domain, intent), "recovery_failures").await?;
        Ok(v.unwrap_or(0))
    }

    async fn increment_recovery_failure(&self, domain: &str, intent: &str) -> Result<u32> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        Ok(conn.hincr(Self::key(domain, intent), "recovery_failures", 1).await?)
    }

    async fn reset_recovery_failures(&self, domain: &str, intent: &str) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.connection_manager.clone();
        conn.hset::<_, _, _, ()>(Self::key(domain, intent), "recovery_failures", 0).await?;
        Ok(())
    }
}
