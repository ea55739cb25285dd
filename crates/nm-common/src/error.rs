use thiserror::Error;

/// Failures talking to the profile or embedding store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out after {0}ms")]
    Timeout(u64),
    #[error("failed to map store row: {0}")]
    Mapping(String),
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(value: deadpool_postgres::PoolError) -> Self {
        StoreError::Unavailable(format!("failed to get postgres connection: {value}"))
    }
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(value: tokio_postgres::Error) -> Self {
        StoreError::Unavailable(format!("postgres error: {value}"))
    }
}

#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    #[error(transparent)]
    Dependency(#[from] StoreError),
}
