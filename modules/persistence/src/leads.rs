use chimera_common::{FieldBag, FieldKey};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// Columns upserted into `leads`, built from a reconciled [`FieldBag`].
#[derive(Debug, Clone, Default)]
pub struct LeadUpsert {
    pub linkedin_url: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub age: Option<i32>,
    pub income: Option<i64>,
    pub dnc_status: Option<bool>,
    pub can_contact: Option<bool>,
    pub confidence_age: Option<f64>,
    pub confidence_income: Option<f64>,
    pub source_metadata: serde_json::Value,
}

impl LeadUpsert {
    pub fn from_field_bag(linkedin_url: impl Into<String>, bag: &FieldBag) -> Self {
        Self {
            linkedin_url: linkedin_url.into(),
            name: bag.get_str(FieldKey::Name).map(String::from),
            phone: bag.get_str(FieldKey::Phone).map(String::from),
            email: bag.get_str(FieldKey::Email).map(String::from),
            city: bag.get_str(FieldKey::City).map(String::from),
            state: bag.get_str(FieldKey::State).map(String::from),
            zipcode: bag.get_str(FieldKey::Zipcode).map(String::from),
            age: bag.get(FieldKey::Age).and_then(|v| v.as_i64()).map(|v| v as i32),
            income: bag.get(FieldKey::Income).and_then(|v| v.as_i64()),
            dnc_status: bag.get_bool(FieldKey::DncStatus),
            can_contact: bag.get_bool(FieldKey::CanContact),
            confidence_age: None,
            confidence_income: None,
            source_metadata: serde_json::to_value(&bag.extras).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Upsert on `linkedin_url`, COALESCE-ing each column so an existing
/// non-null value is never overwritten by a null one (SPEC_FULL.md §6).
/// Returns the row's id so the Persist station can report `lead_id`.
pub async fn upsert_lead(pool: &PgPool, lead: &LeadUpsert) -> Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO leads (
            linkedin_url, name, phone, email, city, state, zipcode, age, income,
            dnc_status, can_contact, confidence_age, confidence_income, source_metadata, enriched_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now())
         ON CONFLICT (linkedin_url) DO UPDATE SET
            name = COALESCE(EXCLUDED.name, leads.name),
            phone = COALESCE(EXCLUDED.phone, leads.phone),
            email = COALESCE(EXCLUDED.email, leads.email),
            city = COALESCE(EXCLUDED.city, leads.city),
            state = COALESCE(EXCLUDED.state, leads.state),
            zipcode = COALESCE(EXCLUDED.zipcode, leads.zipcode),
            age = COALESCE(EXCLUDED.age, leads.age),
            income = COALESCE(EXCLUDED.income, leads.income),
            dnc_status = COALESCE(EXCLUDED.dnc_status, leads.dnc_status),
            can_contact = COALESCE(EXCLUDED.can_contact, leads.can_contact),
            confidence_age = COALESCE(EXCLUDED.confidence_age, leads.confidence_age),
            confidence_income = COALESCE(EXCLUDED.confidence_income, leads.confidence_income),
            source_metadata = leads.source_metadata || EXCLUDED.source_metadata,
            enriched_at = now()
         RETURNING id",
    )
    .bind(&lead.linkedin_url)
    .bind(&lead.name)
    .bind(&lead.phone)
    .bind(&lead.email)
    .bind(&lead.city)
    .bind(&lead.state)
    .bind(&lead.zipcode)
    .bind(lead.age)
    .bind(lead.income)
    .bind(lead.dnc_status)
    .bind(lead.can_contact)
    .bind(lead.confidence_age)
    .bind(lead.confidence_income)
    .bind(&lead.source_metadata)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_field_bag_pulls_reserved_columns() {
        let mut bag = FieldBag::default();
        bag.set(FieldKey::Phone, serde_json::json!("555-0100"));
        bag.set(FieldKey::Age, serde_json::json!(42));

        let upsert = LeadUpsert::from_field_bag("https://linkedin.com/in/x", &bag);
        assert_eq!(upsert.phone.as_deref(), Some("555-0100"));
        assert_eq!(upsert.age, Some(42));
        assert_eq!(upsert.email, None);
    }
}
