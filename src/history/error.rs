use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History storage error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Corrupt history record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected history key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HistoryError>;
