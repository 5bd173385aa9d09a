use std::time::Duration;
use thiserror::Error;

/// Failure of a single collaborator call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranscriptionError {
    /// The service asked us to slow down. The only retryable failure.
    #[error("transcription service rate limited the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("transcription failed: {0}")]
    Failed(String),

    #[error("malformed transcription response: {0}")]
    Malformed(String),
}

impl TranscriptionError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TranscriptionError::RateLimited { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TranscriptionError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Conditions that stop a pipeline run without producing a record.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("extraction cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("strategy '{0}' requires a transcriber")]
    MissingTranscriber(&'static str),

    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to read source document: {0}")]
    Source(#[from] std::io::Error),

    #[error("preprocessing failed: {0}")]
    Preprocess(String),
}
