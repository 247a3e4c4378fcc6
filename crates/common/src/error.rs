use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdsyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("sync state error: {0}")]
    State(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AdsyncResult<T> = Result<T, AdsyncError>;
