use std::time::Duration;

use async_trait::async_trait;
use browserless_client::BrowserSession;
use fingerprint::{mouse_path, MotionState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use vision_client::{ProcessVisionRequest, VisionClient};

use crate::coords::parse_coordinate_pairs;
use crate::error::{Result, WorkerError};

/// Default retry budget for the vision-agent tier (SPEC_FULL.md §4.5).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
const BACKOFF_BASE_MS: u64 = 500;
const CLICK_DOWN_DELAY_MIN_MS: u64 = 150;
const CLICK_DOWN_DELAY_MAX_MS: u64 = 300;
const VERIFICATION_TIMEOUT_MS: u64 = 3_000;

/// Tier 3: out-of-scope external solver interface. No in-repo implementation
/// ships; a deployment wires in a concrete solver when it has one.
#[async_trait]
pub trait ExternalCaptchaSolver: Send + Sync {
    async fn solve(&self, challenge_metadata: serde_json::Value) -> anyhow::Result<serde_json::Value>;
}

/// Attempt to clear a visible CAPTCHA challenge via the vision-agent tier
/// (tier 2). Avoidance (tier 1) lives entirely in the stealth init script;
/// tier 3 is the caller's responsibility if this returns unsolved.
pub async fn resolve_with_vision(
    session: &BrowserSession,
    vision: &dyn VisionClient,
    motion: &mut MotionState,
    challenge_selector: &str,
    instruction: &str,
    max_attempts: u32,
) -> Result<bool> {
    let mut rng = StdRng::from_os_rng();

    for attempt in 0..max_attempts {
        let screenshot = session.screenshot().await?;
        let response = vision
            .process_vision(ProcessVisionRequest {
                screenshot_bytes: screenshot,
                context: "captcha_challenge".to_string(),
                text_command: format!(
                    "Reason step by step about the challenge, then reply with the \
                     tile-center coordinates to click for: {instruction}"
                ),
            })
            .await
            .map_err(|e| WorkerError::Vision(e.to_string()))?;

        let pairs = parse_coordinate_pairs(response.description.as_deref().unwrap_or_default());
        if pairs.is_empty() {
            warn!(attempt, "vision agent returned no parseable coordinates for captcha");
        }

        let mut current_pos = (0.0, 0.0);
        for (i, &(x, y)) in pairs.iter().enumerate() {
            if i > 0 {
                let jitter_ms = rng.random_range(50..150);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            }
            let path = mouse_path(current_pos.0, current_pos.1, x, y, motion);
            for point in &path {
                tokio::time::sleep(Duration::from_millis(point.delay_ms as u64)).await;
            }
            let click_delay = rng.random_range(CLICK_DOWN_DELAY_MIN_MS..CLICK_DOWN_DELAY_MAX_MS);
            session.click_at(x, y).await?;
            tokio::time::sleep(Duration::from_millis(click_delay)).await;
            motion.record_action();
            current_pos = (x, y);
        }

        tokio::time::sleep(Duration::from_millis(VERIFICATION_TIMEOUT_MS)).await;
        if !session.element_exists(challenge_selector).await? {
            info!(attempt, "captcha challenge cleared");
            return Ok(true);
        }

        let backoff = BACKOFF_BASE_MS * 2u64.pow(attempt);
        warn!(attempt, backoff_ms = backoff, "captcha still present, backing off");
        tokio::time::sleep(Duration::from_millis(backoff)).await;
    }

    Ok(false)
}
