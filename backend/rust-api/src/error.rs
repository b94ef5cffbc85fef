use axum::http::StatusCode;
use thiserror::Error;

/// Failures raised by the quiz core. None of them are transient, so callers
/// never retry; they either show a message or treat the error as a defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid transition: cannot {action} while {from}")]
    InvalidTransition { action: &'static str, from: String },

    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    #[error("option {option} is out of range for question at position {position}")]
    InvalidAnswer { position: usize, option: usize },

    #[error("sign in to take the quiz")]
    NotAuthenticated,

    #[error("session not found")]
    SessionNotFound,
}

impl QuizError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QuizError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            QuizError::InvalidState(_) | QuizError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            QuizError::DataIntegrity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QuizError::InvalidAnswer { .. } => StatusCode::BAD_REQUEST,
            QuizError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            QuizError::SessionNotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Message shown to the student. Configuration errors get a fixed text
    /// without setup details; every other error is shown as it reads.
    pub fn public_message(&self) -> String {
        match self {
            QuizError::Configuration(_) => {
                "The quiz is not available right now: not enough questions configured".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<QuizError> for (StatusCode, String) {
    fn from(err: QuizError) -> Self {
        (err.status_code(), err.public_message())
    }
}
