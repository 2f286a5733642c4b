use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Cookies are refreshed by a dedicated auth task every few hours; the TTL
/// is a dead-man's switch so a crashed refresher degrades to "no cookies"
/// rather than serving stale ones forever (SPEC_FULL.md §6).
const COOKIE_TTL_S: u64 = 24 * 60 * 60;

fn cookie_key(platform: &str) -> String {
    format!("auth:cookies:{}", platform.to_lowercase())
}

fn meta_key(platform: &str) -> String {
    format!("auth:meta:{}", platform.to_lowercase())
}

/// One stored cookie, Playwright/Puppeteer shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieMeta {
    pub refreshed_at: DateTime<Utc>,
    pub cookie_count: usize,
}

/// Redis-backed single-writer (auth task), many-reader (workers) cookie
/// store for authenticated portal sessions (SPEC_FULL.md §5/§6): `linkedin`,
/// `facebook`, `salesnavigator`, `ushadvisors`, etc.
pub struct CookieStore {
    connection_manager: ConnectionManager,
}

impl CookieStore {
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

    /// Store `cookies` for `platform` under the documented 24h TTL, plus a
    /// metadata twin recording when and how many were refreshed.
    pub async fn set_cookies(&self, platform: &str, cookies: &[CookieRecord]) -> Result<()> {
        let payload = serde_json::to_string(cookies)?;
        let meta = CookieMeta { refreshed_at: Utc::now(), cookie_count: cookies.len() };
        let meta_payload = serde_json::to_string(&meta)?;

        let mut conn = self.connection_manager.clone();
        conn.set_ex::<_, _, ()>(cookie_key(platform), payload, COOKIE_TTL_S).await?;
        conn.set_ex::<_, _, ()>(meta_key(platform), meta_payload, COOKIE_TTL_S).await?;
        Ok(())
    }

    /// Fetch the cookies for `platform`. `None` means absent or expired, not
    /// an error: callers proceed unauthenticated rather than failing the
    /// mission.
    pub async fn get_cookies(&self, platform: &str) -> Result<Option<Vec<CookieRecord>>> {
        let mut conn = self.connection_manager.clone();
        let raw: Option<String> = conn.get(cookie_key(platform)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn get_meta(&self, platform: &str) -> Result<Option<CookieMeta>> {
        let mut conn = self.connection_manager.clone();
        let raw: Option<String> = conn.get(meta_key(platform)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_lowercased_and_namespaced() {
        assert_eq!(cookie_key("LinkedIn"), "auth:cookies:linkedin");
        assert_eq!(meta_key("LinkedIn"), "auth:meta:linkedin");
    }
}
