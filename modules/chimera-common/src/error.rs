use thiserror::Error;

/// Structured enrichment-error taxonomy (SPEC_FULL.md §7).
///
/// Stations raise these instead of propagating arbitrary exceptions; the
/// pipeline engine records the kind and, where present, `suggested_fix`,
/// then continues unless the kind is itself a stop signal.
#[derive(Error, Debug, Clone)]
pub enum ChimeraError {
    #[error("missing input for station {step}: {reason}")]
    MissingInput { step: String, reason: String },

    #[error("budget exceeded before station {step}")]
    BudgetExceeded { step: String },

    #[error("business gate at station {step}: {reason}")]
    BusinessGate { step: String, reason: String },

    #[error("station {step} failed: {reason}")]
    StructuredEnrichmentError {
        step: String,
        reason: String,
        suggested_fix: Option<String>,
    },

    #[error("transient external failure in {step} after {attempts} attempts: {reason}")]
    TransientExternal {
        step: String,
        reason: String,
        attempts: u32,
    },

    #[error("honeypot blocked click on selector {selector} in domain {domain}")]
    HoneypotBlocked { domain: String, selector: String },

    #[error("session broken for mission {mission_id}: {reason}")]
    SessionBroken { mission_id: String, reason: String },

    #[error("captcha unsolved for mission {mission_id} after {attempts} attempts")]
    CaptchaUnsolved { mission_id: String, attempts: u32 },

    #[error("trauma center exhausted recovery for ({domain}, {intent})")]
    TraumaCenterExhausted { domain: String, intent: String },

    #[error("mission {mission_id} timed out after {elapsed_s}s")]
    MissionTimeout { mission_id: String, elapsed_s: f64 },

    #[error("fatal: {0}")]
    Fatal(String),
}

impl ChimeraError {
    /// `suggested_fix`, when the variant carries one.
    pub fn suggested_fix(&self) -> Option<&str> {
        match self {
            ChimeraError::StructuredEnrichmentError { suggested_fix, .. } => {
                suggested_fix.as_deref()
            }
            _ => None,
        }
    }

    /// Short reason string suitable for a history entry.
    pub fn reason(&self) -> String {
        match self {
            ChimeraError::MissingInput { reason, .. } => reason.clone(),
            ChimeraError::BudgetExceeded { .. } => "budget_exceeded".to_string(),
            ChimeraError::BusinessGate { reason, .. } => reason.clone(),
            ChimeraError::StructuredEnrichmentError { reason, .. } => reason.clone(),
            ChimeraError::TransientExternal { reason, .. } => reason.clone(),
            ChimeraError::HoneypotBlocked { .. } => "honeypot_blocked".to_string(),
            ChimeraError::SessionBroken { reason, .. } => reason.clone(),
            ChimeraError::CaptchaUnsolved { .. } => "captcha_unsolved".to_string(),
            ChimeraError::TraumaCenterExhausted { .. } => "trauma_center_exhausted".to_string(),
            ChimeraError::MissionTimeout { .. } => "timeout".to_string(),
            ChimeraError::Fatal(msg) => msg.clone(),
        }
    }
}
