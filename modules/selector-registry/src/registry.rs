use std::sync::Arc;

use chimera_common::{SelectorKind, SelectorRecord};
use chrono::Utc;
use tracing::error;
use vision_client::{ProcessVisionRequest, VisionClient};

use crate::error::Result;
use crate::store::RegistryStore;

/// Vision-grounding confidence below this triggers a recovery attempt even
/// if the selector hasn't failed outright yet.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// Consecutive selector-usage failures that force a recovery attempt.
pub const FAILURE_COUNT_TRIGGER: u32 = 3;
/// Minimum confidence a vision-proposed replacement selector needs to be
/// registered.
pub const NEW_SELECTOR_MIN_CONFIDENCE: f64 = 0.5;
/// Consecutive failed recovery attempts before surfacing a critical alert
/// and giving up on this (domain, intent).
pub const RECOVERY_EXHAUSTION_STRIKES: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    Recovered(SelectorRecord),
    /// Vision proposed something, but it didn't clear the confidence bar
    /// (or was the uninformative universal selector `*`); not yet
    /// exhausted.
    Rejected,
    /// Three consecutive recovery failures: surface for manual review, do
    /// not retry further.
    Exhausted,
}

/// Per-(domain, intent) selector registry with vision-driven recovery (the
/// "Trauma Center", SPEC_FULL.md §4.8).
pub struct SelectorRegistry<S: RegistryStore> {
    store: Arc<S>,
    vision: Arc<dyn VisionClient>,
}

impl<S: RegistryStore> SelectorRegistry<S> {
    pub fn new(store: Arc<S>, vision: Arc<dyn VisionClient>) -> Self {
        Self { store, vision }
    }

    pub async fn get(&self, domain: &str, intent: &str) -> Result<Option<SelectorRecord>> {
        self.store.get(domain, intent).await
    }

    /// Whether the caller should invoke [`Self::recover`] before continuing:
    /// no known selector, a low-confidence vision grounding, or a selector
    /// that has failed three times in a row.
    pub fn needs_recovery(record: Option<&SelectorRecord>, grounding_confidence: Option<f64>) -> bool {
        match record {
            None => true,
            Some(record) => {
                grounding_confidence.map(|c| c < LOW_CONFIDENCE_THRESHOLD).unwrap_or(false)
                    || record.consecutive_failures >= FAILURE_COUNT_TRIGGER
            }
        }
    }

    pub async fn record_success(&self, domain: &str, intent: &str) -> Result<()> {
        if let Some(mut record) = self.store.get(domain, intent).await? {
            record.consecutive_failures = 0;
            record.last_used = Utc::now();
            self.store.put(&record).await?;
        }
        Ok(())
    }

    pub async fn record_failure(&self, domain: &str, intent: &str) -> Result<u32> {
        let mut record = self.store.get(domain, intent).await?.unwrap_or_else(|| SelectorRecord {
            domain: domain.to_string(),
            intent: intent.to_string(),
            selector: String::new(),
            selector_kind: SelectorKind::Css,
            confidence: 0.0,
            last_used: Utc::now(),
            consecutive_failures: 0,
            metadata: serde_json::Value::Null,
        });
        record.consecutive_failures += 1;
        let count = record.consecutive_failures;
        self.store.put(&record).await?;
        Ok(count)
    }

    /// Invoke the vision-driven "find a new selector for this intent" call.
    /// On success (confidence > 0.5, not the universal `*` fallback),
    /// registers the new selector and resets both failure counters.
    pub async fn recover(
        &self,
        domain: &str,
        intent: &str,
        screenshot_bytes: Vec<u8>,
        context: &str,
    ) -> Result<RecoveryOutcome> {
        let response = self
            .vision
            .process_vision(ProcessVisionRequest {
                screenshot_bytes,
                context: context.to_string(),
                text_command: format!("find a new selector for intent: {intent}"),
            })
            .await
            .map_err(|e| crate::error::RegistryError::Vision(e.to_string()))?;

        let candidate = response.description.filter(|d| !d.is_empty() && d != "*");

        if let (Some(selector), true) = (candidate, response.confidence > NEW_SELECTOR_MIN_CONFIDENCE) {
            let metadata = serde_json::json!({ "x": response.x, "y": response.y });
            let record = SelectorRecord {
                domain: domain.to_string(),
                intent: intent.to_string(),
                selector,
                selector_kind: SelectorKind::Css,
                confidence: response.confidence,
                last_used: Utc::now(),
                consecutive_failures: 0,
                metadata,
            };
            self.store.put(&record).await?;
            self.store.reset_recovery_failures(domain, intent).await?;
            return Ok(RecoveryOutcome::Recovered(record));
        }

        let failures = self.store.increment_recovery_failure(domain, intent).await?;
        if failures >= RECOVERY_EXHAUSTION_STRIKES {
            error!(domain, intent, failures, "Trauma Center exhausted: manual review required");
            Ok(RecoveryOutcome::Exhausted)
        } else {
            Ok(RecoveryOutcome::Rejected)
        }
    }
}
