use chimera_common::{FieldBag, FieldKey};

/// Reserved fields the reconciler merges by provider weight
/// (SPEC_FULL.md §4.9).
const RESERVED_FIELDS: &[FieldKey] = &[
    FieldKey::Phone,
    FieldKey::Age,
    FieldKey::Income,
    FieldKey::Email,
    FieldKey::Address,
    FieldKey::City,
    FieldKey::State,
    FieldKey::Zipcode,
];

/// Default weight for a provider with no recorded success rate.
pub const DEFAULT_WEIGHT: f64 = 0.5;
/// Minimum weight for a provider's extra (non-reserved) fields to carry
/// over into the merged record.
pub const EXTRA_FIELD_WEIGHT_THRESHOLD: f64 = 0.5;

/// One provider's enrichment output plus its success-rate weight, as
/// supplied by the caller (the Router's provider stats).
pub struct ProviderRecord {
    pub provider: String,
    pub weight: f64,
    pub fields: FieldBag,
}

impl ProviderRecord {
    pub fn new(provider: impl Into<String>, weight: f64, fields: FieldBag) -> Self {
        Self { provider: provider.into(), weight, fields }
    }
}

/// Merge per-provider records into one golden record.
///
/// Reserved fields: highest-weight provider wins; non-null beats null;
/// ties break by insertion order (the order `records` was given in).
/// Extra (non-reserved) fields carry over from any provider whose weight is
/// at least [`EXTRA_FIELD_WEIGHT_THRESHOLD`], without overwriting a value a
/// higher-priority provider already set.
pub fn reconcile(records: &[ProviderRecord]) -> FieldBag {
    let mut merged = FieldBag::default();

    for &field in RESERVED_FIELDS {
        let mut best: Option<(usize, f64)> = None;
        for (idx, record) in records.iter().enumerate() {
            if !record.fields.contains(field) {
                continue;
            }
            let weight = record.weight;
            let better = match best {
                None => true,
                Some((_, best_weight)) => weight > best_weight,
            };
            if better {
                best = Some((idx, weight));
            }
        }
        if let Some((idx, _)) = best {
            if let Some(value) = records[idx].fields.get(field) {
                merged.set(field, value.clone());
            }
        }
    }

    for record in records {
        if record.weight < EXTRA_FIELD_WEIGHT_THRESHOLD {
            continue;
        }
        for (key, value) in &record.fields.extras {
            merged.extras.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_with(provider: &str, weight: f64, pairs: &[(FieldKey, serde_json::Value)]) -> ProviderRecord {
        let mut bag = FieldBag::default();
        for (key, value) in pairs {
            bag.set(*key, value.clone());
        }
        ProviderRecord::new(provider, weight, bag)
    }

    #[test]
    fn scenario_6_higher_weight_provider_wins_phone() {
        let a = record_with("A", 0.8, &[(FieldKey::Phone, json!("A1"))]);
        let b = record_with("B", 0.6, &[(FieldKey::Phone, json!("B1"))]);

        let merged = reconcile(&[a, b]);
        assert_eq!(merged.get(FieldKey::Phone), Some(&json!("A1")));
    }

    #[test]
    fn non_null_beats_null_regardless_of_weight() {
        let high_weight_but_absent = record_with("A", 0.9, &[]);
        let low_weight_with_value = record_with("B", 0.2, &[(FieldKey::Email, json!("b@example.com"))]);

        let merged = reconcile(&[high_weight_but_absent, low_weight_with_value]);
        assert_eq!(merged.get(FieldKey::Email), Some(&json!("b@example.com")));
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let first = record_with("A", 0.5, &[(FieldKey::Age, json!(30))]);
        let second = record_with("B", 0.5, &[(FieldKey::Age, json!(45))]);

        let merged = reconcile(&[first, second]);
        assert_eq!(merged.get(FieldKey::Age), Some(&json!(30)));
    }

    #[test]
    fn extra_fields_carry_over_only_above_weight_threshold() {
        let mut low = FieldBag::default();
        low.extras.insert("source_note".into(), json!("from low-weight provider"));
        let low_weight = ProviderRecord::new("low", 0.3, low);

        let mut high = FieldBag::default();
        high.extras.insert("linkedin_headline".into(), json!("Sales Director"));
        let high_weight = ProviderRecord::new("high", 0.7, high);

        let merged = reconcile(&[low_weight, high_weight]);
        assert!(!merged.extras.contains_key("source_note"));
        assert_eq!(merged.extras.get("linkedin_headline"), Some(&json!("Sales Director")));
    }

    #[test]
    fn higher_priority_extra_field_is_not_overwritten_by_later_provider() {
        let mut first = FieldBag::default();
        first.extras.insert("note".into(), json!("first"));
        let p1 = ProviderRecord::new("p1", 0.9, first);

        let mut second = FieldBag::default();
        second.extras.insert("note".into(), json!("second"));
        let p2 = ProviderRecord::new("p2", 0.9, second);

        let merged = reconcile(&[p1, p2]);
        assert_eq!(merged.extras.get("note"), Some(&json!("first")));
    }
}
