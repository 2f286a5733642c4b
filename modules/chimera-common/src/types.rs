use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical field identifiers a pipeline context can carry.
///
/// Station contracts declare required/produced sets over this enum rather
/// than free-form strings so "required ⊆ present" is a set operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    Name,
    FirstName,
    LastName,
    City,
    State,
    Zipcode,
    LinkedinUrl,
    Company,
    Title,
    Phone,
    Email,
    Age,
    Income,
    IncomeRange,
    Address,
    IsValid,
    IsMobile,
    IsVoip,
    IsLandline,
    Carrier,
    IsJunk,
    DncStatus,
    CanContact,
    Saved,
    LeadId,
    /// Internal: the blueprint resolved for this lead's provider.
    Blueprint,
    /// Internal: raised when no blueprint exists for the chosen provider.
    MappingRequired,
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{self:?}"));
        write!(f, "{s}")
    }
}

/// A mutable bag of fields keyed by [`FieldKey`], plus a side map for
/// provider-specific attributes that don't map to a canonical field.
///
/// See SPEC_FULL.md §3 (typed record plus extras bag design note).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldBag {
    pub fields: HashMap<FieldKey, serde_json::Value>,
    pub extras: HashMap<String, serde_json::Value>,
}

impl FieldBag {
    pub fn present_fields(&self) -> HashSet<FieldKey> {
        self.fields.keys().copied().collect()
    }

    pub fn get(&self, key: FieldKey) -> Option<&serde_json::Value> {
        self.fields.get(&key)
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.fields.contains_key(&key)
    }

    pub fn set(&mut self, key: FieldKey, value: serde_json::Value) {
        self.fields.insert(key, value);
    }

    pub fn get_str(&self, key: FieldKey) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: FieldKey) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Merge another bag's fields into this one (extras included),
    /// overwriting on key collision. Used to commit a station's new-fields.
    pub fn merge(&mut self, other: FieldBag) {
        self.fields.extend(other.fields);
        self.extras.extend(other.extras);
    }
}

/// Input record: a person-lead to enrich.
///
/// Accepts the `fullName`/`Name`/`firstName`/`lastName` JSON key variants a
/// source feed might use, aliasing them onto the canonical snake_case fields
/// at deserialization time so `seed_fields` never has to guess at spelling
/// (SPEC_FULL.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    #[serde(alias = "fullName", alias = "Name")]
    pub name: Option<String>,
    #[serde(alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(alias = "lastName")]
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub employer: Option<String>,
    pub title: Option<String>,
    /// Unique canonical URL used as the deduplication key.
    pub canonical_url: String,
}

impl Lead {
    /// Seed a [`FieldBag`] from the lead's own fields, aliasing common name
    /// variants into the canonical `name` field per SPEC_FULL.md §4.1.
    pub fn seed_fields(&self) -> FieldBag {
        let mut bag = FieldBag::default();
        let name = self.name.clone().or_else(|| {
            match (&self.first_name, &self.last_name) {
                (Some(f), Some(l)) => Some(format!("{f} {l}")),
                _ => None,
            }
        });
        if let Some(name) = name {
            bag.set(FieldKey::Name, serde_json::Value::String(name));
        }
        if let Some(v) = &self.first_name {
            bag.set(FieldKey::FirstName, serde_json::Value::String(v.clone()));
        }
        if let Some(v) = &self.last_name {
            bag.set(FieldKey::LastName, serde_json::Value::String(v.clone()));
        }
        if let Some(v) = &self.city {
            bag.set(FieldKey::City, serde_json::Value::String(v.clone()));
        }
        if let Some(v) = &self.state {
            bag.set(FieldKey::State, serde_json::Value::String(v.clone()));
        }
        if let Some(v) = &self.zipcode {
            bag.set(FieldKey::Zipcode, serde_json::Value::String(v.clone()));
        }
        if let Some(v) = &self.employer {
            bag.set(FieldKey::Company, serde_json::Value::String(v.clone()));
        }
        if let Some(v) = &self.title {
            bag.set(FieldKey::Title, serde_json::Value::String(v.clone()));
        }
        bag.set(
            FieldKey::LinkedinUrl,
            serde_json::Value::String(self.canonical_url.clone()),
        );
        bag
    }
}

/// Per-station signal back to the pipeline engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCondition {
    Continue,
    SkipRemaining,
    Fail,
}

/// Enumerated tag attached to a mission result describing a
/// recoverable-but-notable condition, for downstream monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraumaSignal {
    HoneypotTrap,
    SessionBroken,
    NeedsOlmocrVerification,
    Timeout,
    CaptchaUnsolved,
    TraumaCenterExhausted,
}

impl std::fmt::Display for TraumaSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TraumaSignal::HoneypotTrap => "HONEYPOT_TRAP",
            TraumaSignal::SessionBroken => "SESSION_BROKEN",
            TraumaSignal::NeedsOlmocrVerification => "NEEDS_OLMOCR_VERIFICATION",
            TraumaSignal::Timeout => "TIMEOUT",
            TraumaSignal::CaptchaUnsolved => "CAPTCHA_UNSOLVED",
            TraumaSignal::TraumaCenterExhausted => "TRAUMA_CENTER_EXHAUSTED",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Blueprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlueprintStepKind {
    Goto,
    Wait,
    Click,
    Input,
    VlmGround,
    /// Anything not in the set above; the worker logs and skips it.
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintStep {
    #[serde(rename = "type")]
    pub kind: BlueprintStepKind,
    pub selector: Option<String>,
    pub url: Option<String>,
    pub value: Option<String>,
    pub intent: Option<String>,
    pub wait_ms: Option<u64>,
    pub press_enter: Option<bool>,
}

/// Site-specific instruction list keyed by domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub domain: String,
    pub steps: Vec<BlueprintStep>,
}

impl Blueprint {
    /// Resolve `{placeholder}` tokens in step values against lead fields.
    pub fn resolve_templates(&self, bag: &FieldBag) -> Blueprint {
        let resolve = |s: &str| -> String {
            let mut out = s.to_string();
            for (key, value) in &bag.fields {
                if let Some(text) = value.as_str() {
                    out = out.replace(&format!("{{{key}}}"), text);
                }
            }
            out
        };
        Blueprint {
            domain: self.domain.clone(),
            steps: self
                .steps
                .iter()
                .map(|step| BlueprintStep {
                    kind: step.kind,
                    selector: step.selector.clone(),
                    url: step.url.as_deref().map(&resolve),
                    value: step.value.as_deref().map(&resolve),
                    intent: step.intent.clone(),
                    wait_ms: step.wait_ms,
                    press_enter: step.press_enter,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Queued,
    Claimed,
    Executing,
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub mission_id: String,
    pub lead: Lead,
    pub target_provider: String,
    pub blueprint: Option<Blueprint>,
    pub carrier_hint: Option<String>,
    /// Sticky proxy session key, defaults to `mission_id`.
    pub session_id: String,
}

impl Mission {
    pub fn new(lead: Lead, target_provider: impl Into<String>) -> Self {
        let mission_id = Uuid::new_v4().to_string();
        Mission {
            session_id: mission_id.clone(),
            mission_id,
            lead,
            target_provider: target_provider.into(),
            blueprint: None,
            carrier_hint: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub income: Option<i64>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionResult {
    pub status: MissionStatus,
    pub vision_confidence: f64,
    pub captcha_faced: bool,
    pub captcha_solved: bool,
    pub duration_s: f64,
    pub provider: String,
    pub extracted: ExtractedFields,
    pub trauma_signals: Vec<String>,
}

// ---------------------------------------------------------------------------
// Provider statistics value types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProviderCounters {
    pub success_count: u64,
    pub failure_count: u64,
    pub captcha_count: u64,
    pub total_latency_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OutcomeCounters {
    pub success_count: u64,
    pub failure_count: u64,
}

// ---------------------------------------------------------------------------
// Hive Mind value types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub embedding: Vec<f32>,
    pub action_plan: serde_json::Value,
    pub ax_tree_summary: String,
    pub screenshot_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentPattern {
    pub embedding: Vec<f32>,
    pub provider: String,
    pub recovered_data_shape: Vec<String>,
}

// ---------------------------------------------------------------------------
// Selector Registry / Trauma Center
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Css,
    Xpath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorRecord {
    pub domain: String,
    pub intent: String,
    pub selector: String,
    pub selector_kind: SelectorKind,
    pub confidence: f64,
    pub last_used: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Hardware entropy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HardwareEntropySeeds {
    pub gpu: u32,
    pub audio: u32,
    pub canvas: u32,
}

impl HardwareEntropySeeds {
    /// Allocate three fresh 31-bit seeds.
    pub fn allocate(rng: &mut impl rand::RngCore) -> Self {
        let mask = (1u32 << 31) - 1;
        HardwareEntropySeeds {
            gpu: rng.next_u32() & mask,
            audio: rng.next_u32() & mask,
            canvas: rng.next_u32() & mask,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-provider golden-record input
// ---------------------------------------------------------------------------

/// One provider's contribution to a lead, used by the Reconciler.
#[derive(Debug, Clone)]
pub struct ProviderRecord {
    pub provider: String,
    pub fields: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(name: Option<&str>, first: Option<&str>, last: Option<&str>) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            name: name.map(String::from),
            first_name: first.map(String::from),
            last_name: last.map(String::from),
            city: Some("Miami".into()),
            state: Some("FL".into()),
            zipcode: None,
            employer: None,
            title: None,
            canonical_url: "https://example.com/u1".into(),
        }
    }

    #[test]
    fn lead_deserializes_camelcase_name_variants() {
        let raw = serde_json::json!({
            "id": Uuid::new_v4(),
            "fullName": "John Doe",
            "firstName": "John",
            "lastName": "Doe",
            "city": "Miami",
            "state": "FL",
            "zipcode": null,
            "employer": null,
            "title": null,
            "canonical_url": "https://example.com/u1",
        });
        let lead: Lead = serde_json::from_value(raw).unwrap();
        assert_eq!(lead.name.as_deref(), Some("John Doe"));
        assert_eq!(lead.first_name.as_deref(), Some("John"));
        assert_eq!(lead.last_name.as_deref(), Some("Doe"));
    }

    #[test]
    fn seed_fields_aliases_full_name() {
        let bag = lead(Some("John Doe"), None, None).seed_fields();
        assert_eq!(bag.get_str(FieldKey::Name), Some("John Doe"));
    }

    #[test]
    fn seed_fields_combines_first_last_into_name() {
        let bag = lead(None, Some("Jane"), Some("Roe")).seed_fields();
        assert_eq!(bag.get_str(FieldKey::Name), Some("Jane Roe"));
        assert_eq!(bag.get_str(FieldKey::FirstName), Some("Jane"));
    }

    #[test]
    fn seed_fields_no_name_leaves_field_absent() {
        let bag = lead(None, None, None).seed_fields();
        assert!(!bag.contains(FieldKey::Name));
    }

    #[test]
    fn field_bag_merge_overwrites_on_collision() {
        let mut a = FieldBag::default();
        a.set(FieldKey::Phone, serde_json::json!("111"));
        let mut b = FieldBag::default();
        b.set(FieldKey::Phone, serde_json::json!("222"));
        a.merge(b);
        assert_eq!(a.get_str(FieldKey::Phone), Some("222"));
    }

    #[test]
    fn present_fields_reflects_set_keys() {
        let mut bag = FieldBag::default();
        bag.set(FieldKey::Phone, serde_json::json!("111"));
        bag.set(FieldKey::Email, serde_json::json!("a@b.com"));
        let present = bag.present_fields();
        assert!(present.contains(&FieldKey::Phone));
        assert!(present.contains(&FieldKey::Email));
        assert_eq!(present.len(), 2);
    }

    #[test]
    fn blueprint_resolves_placeholder_templates() {
        let mut bag = FieldBag::default();
        bag.set(FieldKey::FirstName, serde_json::json!("Jane"));
        let bp = Blueprint {
            domain: "example.com".into(),
            steps: vec![BlueprintStep {
                kind: BlueprintStepKind::Input,
                selector: Some("#q".into()),
                url: None,
                value: Some("{firstName}".into()),
                intent: None,
                wait_ms: None,
                press_enter: None,
            }],
        };
        let resolved = bp.resolve_templates(&bag);
        assert_eq!(resolved.steps[0].value.as_deref(), Some("Jane"));
    }
}
