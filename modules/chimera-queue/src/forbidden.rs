use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::error::Result;

fn key(domain: &str) -> String {
    format!("dojo:forbidden:{domain}")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ForbiddenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ForbiddenRect {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForbiddenRegions {
    pub rects: Vec<ForbiddenRect>,
    pub selectors: Vec<String>,
}

impl ForbiddenRegions {
    pub fn selector_blocked(&self, selector: &str) -> bool {
        self.selectors.iter().any(|s| s == selector)
    }

    pub fn point_blocked(&self, x: f64, y: f64) -> bool {
        self.rects.iter().any(|r| r.contains(x, y))
    }
}

/// Redis-backed per-domain forbidden selector/region policy consulted by
/// the honeypot guard before any click (SPEC_FULL.md §4.6).
pub struct ForbiddenRegionsStore {
    connection_manager: ConnectionManager,
}

impl ForbiddenRegionsStore {
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

    pub async fn get(&self, domain: &str) -> Result<ForbiddenRegions> {
        let mut conn = self.connection_manager.clone();
        let raw: Option<String> = conn.get(key(domain)).await?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(ForbiddenRegions::default()),
        }
    }

    pub async fn put(&self, domain: &str, regions: &ForbiddenRegions) -> Result<()> {
        let payload = serde_json::to_string(regions)?;
        let mut conn = self.connection_manager.clone();
        conn.set::<_, _, ()>(key(domain), payload).await?;
        Ok(())
    }
}
