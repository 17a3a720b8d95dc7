use thiserror::Error;

/// Errors produced by session, exchange and turn-log operations
#[derive(Error, Debug)]
pub enum InterviewError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Model call failed: {0}")]
    ModelCallFailed(String),

    #[error("Model returned no text")]
    EmptyModelReply,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Unknown role in turn log: {0}")]
    UnknownRole(String),
}

pub type Result<T> = std::result::Result<T, InterviewError>;
