use thiserror::Error;

#[derive(Debug, Error)]
pub enum MentorError {
    #[error("inference error: {0}")]
    Inference(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type MentorResult<T> = Result<T, MentorError>;
