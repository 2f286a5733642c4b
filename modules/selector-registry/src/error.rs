use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Redis command error: {0}")]
    Redis(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("vision service error: {0}")]
    Vision(String),
}

impl From<redis::RedisError> for RegistryError {
    fn from(err: redis::RedisError) -> Self {
        RegistryError::Redis(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}
