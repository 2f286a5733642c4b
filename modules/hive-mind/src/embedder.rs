use async_trait::async_trait;

/// Opaque text-embedding backend (SPEC_FULL.md Non-goals: "training or
/// hosting the vision model" — the embedding model is likewise an external
/// collaborator). Mirrors `ai-client`'s `EmbedAgent` shape.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Deterministic, dependency-free embedder for tests: hashes the text into
/// a fixed-length vector so identical inputs embed identically and distinct
/// inputs are (almost certainly) distinguishable, without calling out to a
/// real model.
pub struct HashEmbedder {
    pub dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        use sha2::{Digest, Sha256};
        let mut out = Vec::with_capacity(self.dims);
        let mut counter: u32 = 0;
        while out.len() < self.dims {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks(4) {
                if out.len() >= self.dims {
                    break;
                }
                let bytes: [u8; 4] = chunk.try_into().unwrap_or([0; 4]);
                let v = u32::from_le_bytes(bytes) as f32 / u32::MAX as f32;
                out.push(v - 0.5);
            }
            counter += 1;
        }
        Ok(out)
    }
}
