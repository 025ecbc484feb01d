use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::SessionId;
use crate::model::session::{QuizSession, SessionStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("question count ({total}) does not match outcome counts ({sum})")]
    CountMismatch { total: u32, sum: u32 },

    #[error("too many questions for a single session: {len}")]
    TooManyQuestions { len: usize },

    #[error("session is not completed")]
    NotCompleted,
}

/// Aggregate result for a completed quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSummary {
    session_id: SessionId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_questions: u32,
    correct: u32,
    incorrect: u32,
    unanswered: u32,
    total_answer_seconds: u32,
}

impl AttemptSummary {
    /// Rehydrate a summary from persisted values.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::InvalidTimeRange` if `completed_at` precedes
    /// `started_at` and `SummaryError::CountMismatch` if outcome counts do
    /// not add up to the question total.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        session_id: SessionId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        total_questions: u32,
        correct: u32,
        incorrect: u32,
        unanswered: u32,
        total_answer_seconds: u32,
    ) -> Result<Self, SummaryError> {
        if completed_at < started_at {
            return Err(SummaryError::InvalidTimeRange);
        }
        let sum = correct + incorrect + unanswered;
        if sum != total_questions {
            return Err(SummaryError::CountMismatch {
                total: total_questions,
                sum,
            });
        }

        Ok(Self {
            session_id,
            started_at,
            completed_at,
            total_questions,
            correct,
            incorrect,
            unanswered,
            total_answer_seconds,
        })
    }

    /// Build a summary from a completed session's graded answers.
    ///
    /// An answered question only counts as correct when the backend graded it
    /// `Some(true)`; answered-but-ungraded records count as incorrect so the
    /// totals always add up.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::NotCompleted` unless the session is terminal,
    /// and `SummaryError::TooManyQuestions` if the question count cannot fit
    /// in `u32`.
    pub fn from_session(session: &QuizSession) -> Result<Self, SummaryError> {
        if session.status() != SessionStatus::Completed {
            return Err(SummaryError::NotCompleted);
        }
        let (Some(started_at), Some(completed_at)) = (session.started_at(), session.completed_at())
        else {
            return Err(SummaryError::NotCompleted);
        };

        let total_questions = u32::try_from(session.questions().len()).map_err(|_| {
            SummaryError::TooManyQuestions {
                len: session.questions().len(),
            }
        })?;

        let mut correct = 0_u32;
        let mut total_answer_seconds = 0_u32;
        for record in session.answers().values() {
            if record.is_correct == Some(true) {
                correct = correct.saturating_add(1);
            }
            total_answer_seconds = total_answer_seconds.saturating_add(record.time_taken_seconds);
        }

        let answered = u32::try_from(session.answers().len()).map_err(|_| {
            SummaryError::TooManyQuestions {
                len: session.answers().len(),
            }
        })?;
        let incorrect = answered.saturating_sub(correct);
        let unanswered = total_questions.saturating_sub(answered);

        Self::from_persisted(
            session.id(),
            started_at,
            completed_at,
            total_questions,
            correct,
            incorrect,
            unanswered,
            total_answer_seconds,
        )
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.incorrect
    }

    #[must_use]
    pub fn unanswered(&self) -> u32 {
        self.unanswered
    }

    #[must_use]
    pub fn total_answer_seconds(&self) -> u32 {
        self.total_answer_seconds
    }
}
