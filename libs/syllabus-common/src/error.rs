//! Error types shared by the API and the store backends.

use thiserror::Error;

/// Message substituted when an error carries no description
pub const GENERIC_FAILURE: &str = "Something bad happened, but the cause is unknown";

/// Failures raised by a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to encode or decode document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures surfaced by the service to its callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("test not found: {0}")]
    TestNotFound(String),

    #[error("question not found: {0}")]
    QuestionNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("course not found: {0}")]
    CourseNotFound(String),

    /// A required request field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The code runner rejected the submission or returned an unusable verdict.
    #[error("code runner failure: {0}")]
    RunnerFailure(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::TestNotFound(_)
                | ServiceError::QuestionNotFound(_)
                | ServiceError::UserNotFound(_)
                | ServiceError::CourseNotFound(_)
        )
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::TestNotFound(_)
            | ServiceError::QuestionNotFound(_)
            | ServiceError::UserNotFound(_)
            | ServiceError::CourseNotFound(_) => "not_found",
            ServiceError::Validation(_) => "validation",
            ServiceError::RunnerFailure(_) => "runner_failure",
            ServiceError::Persistence(_) => "persistence",
        }
    }

    /// Description shown to clients; never empty.
    pub fn public_message(&self) -> String {
        // Only these variants can carry a blank description
        let detail = match self {
            ServiceError::Validation(msg) | ServiceError::RunnerFailure(msg) => msg.as_str(),
            _ => return self.to_string(),
        };
        if detail.trim().is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            self.to_string()
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
