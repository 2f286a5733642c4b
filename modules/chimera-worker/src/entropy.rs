use async_trait::async_trait;
use chimera_common::HardwareEntropySeeds;

/// Persistence hook for per-mission hardware entropy seeds (SPEC_FULL.md
/// §4.2 step 1: "allocate ... persist"). Kept behind a trait so the worker
/// runtime doesn't need a hard dependency on the `persistence` crate.
#[async_trait]
pub trait EntropySink: Send + Sync {
    async fn record(&self, worker_id: &str, seeds: HardwareEntropySeeds) -> anyhow::Result<()>;
}

/// Default sink for workers run without a Postgres pool configured.
pub struct NoopEntropySink;

#[async_trait]
impl EntropySink for NoopEntropySink {
    async fn record(&self, _worker_id: &str, _seeds: HardwareEntropySeeds) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn allocate(rng: &mut impl rand::RngCore) -> HardwareEntropySeeds {
    HardwareEntropySeeds::allocate(rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_sink_always_succeeds() {
        let sink = NoopEntropySink;
        let seeds = HardwareEntropySeeds { gpu: 1, audio: 2, canvas: 3 };
        assert!(sink.record("worker-0", seeds).await.is_ok());
    }
}
