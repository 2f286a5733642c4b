use std::env;

use tracing::{info, warn};

/// Application configuration loaded from environment variables
/// (SPEC_FULL.md §6 environment variables).
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Missing this disables persistence
    /// (soft degradation, logged at `critical`/`error` level).
    pub database_url: Option<String>,
    pub db_pool_max: u32,
    pub db_connect_timeout_s: u64,

    pub redis_url: String,

    pub proxy_url: Option<String>,

    pub worker_id: String,

    pub chrome_ua_version: String,
    pub chrome_ua_platform: String,

    pub vision_brain_http_url: String,

    pub smoke_results_timeout_s: u64,

    /// Not named in `spec.md`'s environment-variable list, which predates
    /// the Browserless REST façade as the chosen headless-browser backend;
    /// resolved and recorded in DESIGN.md alongside the other Open
    /// Questions rather than hardcoded.
    pub browserless_url: String,
    pub browserless_token: Option<String>,

    pub worker_pool_size: usize,
    pub health_port: u16,
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} must be set"))
}

fn optional_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration required by the dispatcher/worker process.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok(),
            db_pool_max: parse_env("DB_POOL_MAX", 10),
            db_connect_timeout_s: parse_env("DB_CONNECT_TIMEOUT", 5),
            redis_url: required_env("REDIS_URL"),
            proxy_url: env::var("PROXY_URL").ok(),
            worker_id: optional_env("CHIMERA_WORKER_ID", "worker-0"),
            chrome_ua_version: optional_env("CHROME_UA_VERSION", "124.0.6367.91"),
            chrome_ua_platform: optional_env("CHROME_UA_PLATFORM", "Win32"),
            vision_brain_http_url: required_env("CHIMERA_BRAIN_HTTP_URL"),
            smoke_results_timeout_s: parse_env("SMOKE_RESULTS_TIMEOUT", 15),
            browserless_url: optional_env("BROWSERLESS_URL", "http://localhost:3000"),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
            worker_pool_size: parse_env("WORKER_POOL_SIZE", 4),
            health_port: parse_env("HEALTH_PORT", 8080),
        }
    }

    /// Log the loaded configuration with secrets redacted.
    pub fn log_redacted(&self) {
        info!(
            redis_url = %redact_url(&self.redis_url),
            database_url = %self.database_url.as_deref().map(redact_url).unwrap_or_else(|| "<disabled>".into()),
            db_pool_max = self.db_pool_max,
            worker_id = %self.worker_id,
            vision_brain_http_url = %self.vision_brain_http_url,
            "loaded configuration"
        );
        if self.database_url.is_none() {
            warn!("DATABASE_URL not set: persistence is disabled (soft degradation)");
        }
    }
}

/// Mask userinfo in a connection URL so credentials never hit logs.
fn redact_url(url: &str) -> String {
    if let Some(scheme_end) = url.find("://") {
        let (scheme, rest) = url.split_at(scheme_end + 3);
        if let Some(at) = rest.find('@') {
            return format!("{scheme}***@{}", &rest[at + 1..]);
        }
    }
    url.to_string()
}
