use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quiz_core::model::{AnswerOption, QuestionId, SessionId};

use crate::record::{RecordError, SessionRecord};

/// Errors surfaced by quiz backend adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("session not found")]
    NotFound,

    /// Completion was rejected because questions are still unanswered.
    ///
    /// Kept distinct from generic failures so callers can route the user
    /// back to the open questions instead of showing a retry prompt.
    #[error("{unanswered} questions are unanswered")]
    IncompleteAnswers { unanswered: u32 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("request failed with status {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl BackendError {
    /// True when completion was rejected for unanswered questions.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::IncompleteAnswers { .. })
    }
}

/// Payload reporting one answered question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub selected_option: AnswerOption,
    pub time_taken_seconds: u32,
}

/// Remote quiz service contract.
///
/// All durable state lives behind this trait; the services layer keeps only
/// per-attempt working state in memory.
#[async_trait]
pub trait QuizBackend: Send + Sync {
    /// Start a pending session. The returned record carries the
    /// authoritative `started_at`, which clients must adopt instead of
    /// their own clock.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` for an unknown session, or other
    /// backend errors.
    async fn start_quiz(&self, id: SessionId) -> Result<SessionRecord, BackendError>;

    /// Report one answered question. Safe to call repeatedly for the same
    /// question; the server keeps the latest submission per question.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` when the session is unknown or not active.
    async fn submit_answer(
        &self,
        id: SessionId,
        answer: AnswerSubmission,
    ) -> Result<(), BackendError>;

    /// Complete the session and grade its answers.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::IncompleteAnswers` when the backend enforces
    /// completeness and questions are unanswered, or other backend errors.
    async fn complete_quiz(&self, id: SessionId) -> Result<SessionRecord, BackendError>;

    /// Fetch the current session state, used for resuming and polling.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` for an unknown session.
    async fn get_quiz(&self, id: SessionId) -> Result<SessionRecord, BackendError>;
}
