use thiserror::Error;

pub type Result<T> = std::result::Result<T, HiveMindError>;

#[derive(Debug, Error)]
pub enum HiveMindError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("embedder error: {0}")]
    Embedder(String),
}
