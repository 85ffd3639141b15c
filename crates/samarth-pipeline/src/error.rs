use std::fmt;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the bus, the stage wrapper and the executor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("stage '{stage}' failed ({kind}): {message}")]
    StageProcessing {
        stage: String,
        kind: String,
        message: String,
    },

    #[error("request {correlation_id} timed out after {elapsed:?}")]
    Timeout {
        correlation_id: Uuid,
        elapsed: Duration,
    },

    #[error("no pending request for {correlation_id:?} on '{topic}'")]
    Unroutable {
        topic: String,
        correlation_id: Option<Uuid>,
    },

    #[error("handler '{handler}' failed on '{topic}': {message}")]
    Dispatch {
        topic: String,
        handler: String,
        message: String,
    },

    #[error("request {0} is already pending")]
    DuplicateCorrelation(Uuid),

    #[error("request {0} was dropped before it resolved")]
    Abandoned(Uuid),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),
}

impl PipelineError {
    /// Stage name for failures attributed to a stage.
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineError::StageProcessing { stage, .. } => Some(stage),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::Timeout { .. })
    }
}

/// Failure reported by a stage's `process` implementation.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("no data: {0}")]
    NoData(String),

    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StageError {
    /// Stable, machine-readable kind carried in `pipeline.error` payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::InvalidInput(_) => "invalid_input",
            StageError::Unsupported(_) => "unsupported",
            StageError::NoData(_) => "no_data",
            StageError::Payload(_) => "payload",
            StageError::Internal(_) => "internal",
        }
    }
}

/// Error returned by a raw bus handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<PipelineError> for HandlerError {
    fn from(err: PipelineError) -> Self {
        Self::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_kinds() {
        assert_eq!(StageError::InvalidInput("x".into()).kind(), "invalid_input");
        assert_eq!(StageError::NoData("x".into()).kind(), "no_data");
        assert_eq!(
            StageError::from(anyhow::anyhow!("boom")).kind(),
            "internal"
        );

        let decode = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        assert_eq!(StageError::from(decode).kind(), "payload");
    }

    #[test]
    fn test_stage_attribution() {
        let err = PipelineError::StageProcessing {
            stage: "analysis".to_string(),
            kind: "no_data".to_string(),
            message: "empty".to_string(),
        };
        assert_eq!(err.stage(), Some("analysis"));
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "stage 'analysis' failed (no_data): empty");
    }
}
