use std::sync::Arc;
use std::time::Instant;

use chimera_common::{FieldBag, Lead, StopCondition};
use chrono::Utc;
use tracing::{debug, warn};

use crate::context::{HistoryEntry, PipelineContext};
use crate::error::EnrichmentError;
use crate::station::Station;

/// The final record handed back to the caller: merged fields plus the
/// pipeline metadata the engine attaches after the loop (SPEC_FULL.md §4.1:
/// "total cost, stations executed, error count").
pub struct PipelineReport {
    pub bag: FieldBag,
    pub history: Vec<HistoryEntry>,
    pub total_cost: f64,
    pub stations_executed: usize,
    pub error_count: usize,
}

/// Drives one lead through an ordered station list under a cost budget
/// (SPEC_FULL.md §4.1). Reentrant: concurrent leads each get their own
/// [`PipelineContext`], so one engine instance is shared across tasks.
pub struct PipelineEngine {
    stations: Vec<Arc<dyn Station>>,
}

impl PipelineEngine {
    pub fn new(stations: Vec<Arc<dyn Station>>) -> Self {
        Self { stations }
    }

    pub async fn run(&self, lead: &Lead, budget: f64) -> PipelineReport {
        let mut ctx = PipelineContext::new(lead, budget);

        for station in &self.stations {
            let started_at = Utc::now();
            let present = ctx.bag.present_fields();

            if !station.required_inputs().iter().all(|f| present.contains(f)) {
                debug!(station = station.name(), "missing required inputs, skipping");
                ctx.history.push(HistoryEntry::missing_inputs(station.name(), started_at));
                continue;
            }

            if ctx.running_cost + station.cost_estimate() > ctx.budget {
                debug!(station = station.name(), "budget exceeded, terminating pipeline");
                ctx.history.push(HistoryEntry::budget_exceeded(station.name(), started_at));
                break;
            }

            let clock = Instant::now();
            let result = station.process(&ctx).await;
            let duration_ms = clock.elapsed().as_millis() as u64;
            // Cost is debited on invocation regardless of outcome: the
            // station has already spent external-service credit.
            ctx.running_cost += station.cost_estimate();

            match result {
                Ok(outcome) => {
                    ctx.bag.merge(outcome.fields);
                    if let Some(contribution) = outcome.contribution {
                        ctx.provider_contributions.push(contribution);
                    }
                    ctx.history.push(HistoryEntry::completed(station.name(), started_at, duration_ms, outcome.stop));
                    if let StopCondition::SkipRemaining = outcome.stop {
                        break;
                    }
                }
                Err(err) => {
                    warn!(station = station.name(), error = %err, "station failed");
                    ctx.history.push(HistoryEntry::failed(station.name(), started_at, duration_ms, err.clone()));
                    ctx.errors.push(err);
                }
            }
        }

        PipelineReport {
            stations_executed: ctx.stations_executed(),
            error_count: ctx.errors.len(),
            total_cost: ctx.running_cost,
            bag: ctx.bag,
            history: ctx.history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chimera_common::{FieldKey, Lead};
    use serde_json::json;
    use uuid::Uuid;

    use crate::station::StationOutcome;

    fn lead() -> Lead {
        Lead {
            id: Uuid::new_v4(),
            name: Some("John Doe".into()),
            first_name: None,
            last_name: None,
            city: None,
            state: None,
            zipcode: None,
            employer: None,
            title: None,
            canonical_url: "u1".into(),
        }
    }

    struct StubStation {
        name: &'static str,
        required: Vec<FieldKey>,
        produced: Vec<FieldKey>,
        cost: f64,
        outcome: fn() -> Result<StationOutcome, EnrichmentError>,
    }

    #[async_trait]
    impl Station for StubStation {
        fn name(&self) -> &str {
            self.name
        }
        fn required_inputs(&self) -> &[FieldKey] {
            &self.required
        }
        fn produces_outputs(&self) -> &[FieldKey] {
            &self.produced
        }
        fn cost_estimate(&self) -> f64 {
            self.cost
        }
        async fn process(&self, _ctx: &PipelineContext) -> Result<StationOutcome, EnrichmentError> {
            (self.outcome)()
        }
    }

    #[tokio::test]
    async fn empty_station_list_leaves_record_unchanged_plus_metadata() {
        let engine = PipelineEngine::new(vec![]);
        let report = engine.run(&lead(), 5.0).await;
        assert_eq!(report.stations_executed, 0);
        assert_eq!(report.total_cost, 0.0);
        assert_eq!(report.bag.get(FieldKey::Name), Some(&json!("John Doe")));
    }

    #[tokio::test]
    async fn missing_required_input_skips_without_invoking_station() {
        let station = Arc::new(StubStation {
            name: "needs_phone",
            required: vec![FieldKey::Phone],
            produced: vec![],
            cost: 1.0,
            outcome: || panic!("should not be invoked"),
        });
        let engine = PipelineEngine::new(vec![station]);
        let report = engine.run(&lead(), 5.0).await;
        assert_eq!(report.stations_executed, 0);
        assert_eq!(report.total_cost, 0.0);
    }

    #[tokio::test]
    async fn budget_exceeded_terminates_before_invocation() {
        let expensive = Arc::new(StubStation {
            name: "expensive",
            required: vec![],
            produced: vec![],
            cost: 10.0,
            outcome: || panic!("should not be invoked"),
        });
        let never_reached = Arc::new(StubStation {
            name: "never_reached",
            required: vec![],
            produced: vec![],
            cost: 0.0,
            outcome: || Ok(StationOutcome::continue_with(FieldBag::default())),
        });
        let engine = PipelineEngine::new(vec![expensive, never_reached]);
        let report = engine.run(&lead(), 5.0).await;
        assert_eq!(report.stations_executed, 0);
        assert_eq!(report.history.len(), 1);
    }

    #[tokio::test]
    async fn skip_remaining_stops_the_loop() {
        let gate = Arc::new(StubStation {
            name: "gate",
            required: vec![],
            produced: vec![],
            cost: 0.0,
            outcome: || Ok(StationOutcome::skip_remaining(FieldBag::default())),
        });
        let after = Arc::new(StubStation {
            name: "after",
            required: vec![],
            produced: vec![],
            cost: 0.0,
            outcome: || panic!("should not be invoked"),
        });
        let engine = PipelineEngine::new(vec![gate, after]);
        let report = engine.run(&lead(), 5.0).await;
        assert_eq!(report.stations_executed, 1);
        assert_eq!(report.history.len(), 1);
    }

    #[tokio::test]
    async fn station_failure_is_recorded_but_pipeline_continues() {
        let failing = Arc::new(StubStation {
            name: "failing",
            required: vec![],
            produced: vec![],
            cost: 0.0,
            outcome: || Err(EnrichmentError::new("failing", "boom")),
        });
        let after = Arc::new(StubStation {
            name: "after",
            required: vec![],
            produced: vec![],
            cost: 0.0,
            outcome: || Ok(StationOutcome::continue_with(FieldBag::default())),
        });
        let engine = PipelineEngine::new(vec![failing, after]);
        let report = engine.run(&lead(), 5.0).await;
        assert_eq!(report.error_count, 1);
        assert_eq!(report.stations_executed, 1);
    }

    #[tokio::test]
    async fn cost_is_debited_even_when_station_fails() {
        let failing = Arc::new(StubStation {
            name: "failing",
            required: vec![],
            produced: vec![],
            cost: 1.5,
            outcome: || Err(EnrichmentError::new("failing", "boom")),
        });
        let engine = PipelineEngine::new(vec![failing]);
        let report = engine.run(&lead(), 5.0).await;
        assert_eq!(report.total_cost, 1.5);
    }
}
