use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Record store is not initialized: no active root configured")]
    StoreUnavailable,

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No tokio runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type TrackResult<T> = Result<T, TrackError>;
