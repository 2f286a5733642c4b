use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A station's structured failure: {step, reason, suggested_fix?}
/// (SPEC_FULL.md §4.1 step 3/6). Recorded by the engine and attached to
/// history; never fatal to the pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentError {
    pub step: String,
    pub reason: String,
    pub suggested_fix: Option<String>,
}

impl EnrichmentError {
    pub fn new(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { step: step.into(), reason: reason.into(), suggested_fix: None }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }
}

impl std::fmt::Display for EnrichmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.step, self.reason)?;
        if let Some(fix) = &self.suggested_fix {
            write!(f, " (suggested fix: {fix})")?;
        }
        Ok(())
    }
}

impl std::error::Error for EnrichmentError {}

/// Errors a station's collaborator call can surface before it is folded
/// into an [`EnrichmentError`] (SPEC_FULL.md §7: *TransientExternal* ->
/// bounded retry -> surfaced as a structured enrichment error).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("transient error calling {service}: {message}")]
    Transient { service: String, message: String },

    #[error("{0}")]
    Other(String),
}
