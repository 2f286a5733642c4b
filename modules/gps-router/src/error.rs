use thiserror::Error;

pub type Result<T> = std::result::Result<T, GpsError>;

#[derive(Debug, Error)]
pub enum GpsError {
    #[error("Redis command error: {0}")]
    Command(String),

    #[error("no candidate providers remain (all tried or blacklisted)")]
    NoCandidates,
}

impl From<redis::RedisError> for GpsError {
    fn from(err: redis::RedisError) -> Self {
        GpsError::Command(err.to_string())
    }
}
