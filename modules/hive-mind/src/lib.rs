pub mod embedder;
pub mod error;
pub mod similarity;
pub mod store;

pub use embedder::{HashEmbedder, TextEmbedder};
pub use error::{HiveMindError, Result};
pub use store::{HiveMind, MemoryHit};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn embedder() -> Arc<dyn TextEmbedder> {
        Arc::new(HashEmbedder::new(384))
    }

    #[tokio::test]
    async fn hash_embedder_is_deterministic_and_384_dims() {
        let e = embedder();
        let a = e.embed("hello world").await.unwrap();
        let b = e.embed("hello world").await.unwrap();
        assert_eq!(a.len(), 384);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn hash_embedder_distinguishes_different_text() {
        let e = embedder();
        let a = e.embed("alpha").await.unwrap();
        let b = e.embed("beta").await.unwrap();
        assert_ne!(a, b);
    }
}
