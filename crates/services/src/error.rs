//! Shared error types for the services crate.

use thiserror::Error;

use backend::{BackendError, RecordError};
use quiz_core::model::{SessionError, SummaryError};

/// Errors emitted by the attempt state machine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt has not started")]
    NotStarted,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Summary(#[from] SummaryError),
}

/// Errors emitted by `QuizSessionController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Attempt(#[from] AttemptError),
}

impl ControllerError {
    /// True when a completion was rejected for unanswered questions.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Backend(err) if err.is_incomplete())
    }
}
