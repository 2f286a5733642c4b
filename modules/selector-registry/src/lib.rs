pub mod error;
pub mod registry;
pub mod store;

pub use error::{RegistryError, Result};
pub use registry::{RecoveryOutcome, SelectorRegistry};
pub use store::{RedisRegistryStore, RegistryStore};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chimera_common::{SelectorKind, SelectorRecord};
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use vision_client::mock::MockVisionClient;
    use vision_client::ProcessVisionResponse;

    #[derive(Default)]
    struct InMemoryStore {
        records: Mutex<HashMap<(String, String), SelectorRecord>>,
        recovery_failures: Mutex<HashMap<(String, String), u32>>,
    }

    #[async_trait]
    impl RegistryStore for InMemoryStore {
        async fn get(&self, domain: &str, intent: &str) -> Result<Option<SelectorRecord>> {
            Ok(self.records.lock().unwrap().get(&(domain.to_string(), intent.to_string())).cloned())
        }

        async fn put(&self, record: &SelectorRecord) -> Result<()> {
            self.records
                .lock()
                .unwrap()
                .insert((record.domain.clone(), record.intent.clone()), record.clone());
            Ok(())
        }

        async fn recovery_failure_count(&self, domain: &str, intent: &str) -> Result<u32> {
            Ok(*self
                .recovery_failures
                .lock()
                .unwrap()
                .get(&(domain.to_string(), intent.to_string()))
                .unwrap_or(&0))
        }

        async fn increment_recovery_failure(&self, domain: &str, intent: &str) -> Result<u32> {
            let mut map = self.recovery_failures.lock().unwrap();
            let entry = map.entry((domain.to_string(), intent.to_string())).or_insert(0);
            *entry += 1;
            Ok(*entry)
        }

        async fn reset_recovery_failures(&self, domain: &str, intent: &str) -> Result<()> {
            self.recovery_failures
                .lock()
                .unwrap()
                .insert((domain.to_string(), intent.to_string()), 0);
            Ok(())
        }
    }

    fn stub_record(failures: u32) -> SelectorRecord {
        SelectorRecord {
            domain: "example.com".into(),
            intent: "submit".into(),
            selector: "#submit".into(),
            selector_kind: SelectorKind::Css,
            confidence: 0.9,
            last_used: Utc::now(),
            consecutive_failures: failures,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn needs_recovery_when_no_record() {
        assert!(SelectorRegistry::<InMemoryStore>::needs_recovery(None, None));
    }

    #[test]
    fn needs_recovery_on_low_confidence_grounding() {
        let record = stub_record(0);
        assert!(SelectorRegistry::<InMemoryStore>::needs_recovery(Some(&record), Some(0.5)));
        assert!(!SelectorRegistry::<InMemoryStore>::needs_recovery(Some(&record), Some(0.9)));
    }

    #[test]
    fn needs_recovery_on_three_failures() {
        let record = stub_record(3);
        assert!(SelectorRegistry::<InMemoryStore>::needs_recovery(Some(&record), None));
        let fresh = stub_record(1);
        assert!(!SelectorRegistry::<InMemoryStore>::needs_recovery(Some(&fresh), None));
    }

    #[tokio::test]
    async fn recover_registers_confident_selector_and_resets_failures() {
        let store = Arc::new(InMemoryStore::default());
        let vision = Arc::new(MockVisionClient::new().with_process_vision(ProcessVisionResponse {
            found: true,
            x: Some(42.0),
            y: Some(99.0),
            width: Some(10.0),
            height: Some(10.0),
            confidence: 0.8,
            description: Some("button.cta-submit".into()),
        }));
        let registry = SelectorRegistry::new(store.clone(), vision);

        let outcome = registry.recover("example.com", "submit", vec![], "ctx").await.unwrap();
        match outcome {
            RecoveryOutcome::Recovered(record) => {
                assert_eq!(record.selector, "button.cta-submit");
                assert_eq!(record.consecutive_failures, 0);
            }
            other => panic!("expected Recovered, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn recover_rejects_universal_selector_fallback() {
        let store = Arc::new(InMemoryStore::default());
        let vision = Arc::new(MockVisionClient::new().with_process_vision(ProcessVisionResponse {
            found: true,
            x: Some(1.0),
            y: Some(1.0),
            width: None,
            height: None,
            confidence: 0.95,
            description: Some("*".into()),
        }));
        let registry = SelectorRegistry::new(store, vision);

        let outcome = registry.recover("example.com", "submit", vec![], "ctx").await.unwrap();
        assert_eq!(outcome, RecoveryOutcome::Rejected);
    }

    #[tokio::test]
    async fn recover_exhausts_after_three_consecutive_failures() {
        use std::sync::Arc as StdArc;
        let store = StdArc::new(InMemoryStore::default());

        for i in 0..3 {
            let vision = StdArc::new(MockVisionClient::new().with_process_vision(ProcessVisionResponse {
                found: false,
                x: None,
                y: None,
                width: None,
                height: None,
                confidence: 0.1,
                description: None,
            }));
            let registry = SelectorRegistry::new(store.clone(), vision);
            let outcome = registry.recover("example.com", "submit", vec![], "ctx").await.unwrap();
            if i < 2 {
                assert_eq!(outcome, RecoveryOutcome::Rejected, "attempt {i}");
            } else {
                assert_eq!(outcome, RecoveryOutcome::Exhausted, "attempt {i}");
            }
        }
    }
}
