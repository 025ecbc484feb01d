use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::model::answer::AnswerRecord;
use crate::model::ids::{QuestionId, SessionId};
use crate::model::question::Question;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised by quiz session state transitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot transition from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("session is not in progress")]
    NotInProgress,

    #[error("session has not been started")]
    NotStarted,

    #[error("session has no questions")]
    Empty,

    #[error("duration must be positive")]
    ZeroDuration,

    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),

    #[error("session record is missing a timestamp for status {0}")]
    MissingTimestamp(SessionStatus),
}

//
// ─── STATUS ───────────────────────────────────────────────────────────────────
//

/// Lifecycle of a quiz attempt.
///
/// Transitions are forward-only: a session never regresses from `Completed`
/// or returns to `Pending` once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
}

impl SessionStatus {
    /// Whether moving from this status to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress) | (Self::InProgress, Self::Completed)
        )
    }

    /// Completed is the only terminal status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// One timed quiz attempt: a fixed question list, a duration, and the answers
/// accumulated so far.
///
/// The aggregate enforces the lifecycle invariants: `started_at` is recorded
/// exactly once, answers are only mutable while in progress, and `Completed`
/// is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    id: SessionId,
    status: SessionStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    duration_seconds: u32,
    questions: Vec<Question>,
    answers: HashMap<QuestionId, AnswerRecord>,
}

impl QuizSession {
    /// Create a pending session with no answers.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when `questions` is empty and
    /// `SessionError::ZeroDuration` when `duration_seconds` is zero.
    pub fn new(
        id: SessionId,
        duration_seconds: u32,
        questions: Vec<Question>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        if duration_seconds == 0 {
            return Err(SessionError::ZeroDuration);
        }

        Ok(Self {
            id,
            status: SessionStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_seconds,
            questions,
            answers: HashMap::new(),
        })
    }

    /// Rehydrate a session from a backend record.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the parts are inconsistent: empty question
    /// list, zero duration, answers referencing unknown questions, or a
    /// status that requires a timestamp the record does not carry.
    pub fn from_parts(
        id: SessionId,
        status: SessionStatus,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        duration_seconds: u32,
        questions: Vec<Question>,
        answers: HashMap<QuestionId, AnswerRecord>,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(id, duration_seconds, questions)?;

        if status != SessionStatus::Pending && started_at.is_none() {
            return Err(SessionError::MissingTimestamp(status));
        }
        if status == SessionStatus::Completed && completed_at.is_none() {
            return Err(SessionError::MissingTimestamp(status));
        }
        for question_id in answers.keys() {
            if session.question(*question_id).is_none() {
                return Err(SessionError::UnknownQuestion(*question_id));
            }
        }

        session.status = status;
        session.started_at = started_at;
        session.completed_at = completed_at;
        session.answers = answers;
        Ok(session)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionId, AnswerRecord> {
        &self.answers
    }

    /// Look up a question by ID.
    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    /// Look up a question by position.
    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.questions.len().saturating_sub(self.answers.len())
    }

    /// The instant the deadline elapses, once the session has started.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.started_at
            .map(|at| at + Duration::seconds(i64::from(self.duration_seconds)))
    }

    /// Time left on the clock, floored at zero. `None` before start.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.deadline()
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }

    /// Transition from `Pending` to `InProgress`, recording the authoritative
    /// server start time exactly once.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is pending.
    pub fn begin(&mut self, started_at: DateTime<Utc>) -> Result<(), SessionError> {
        if !self.status.can_transition_to(SessionStatus::InProgress) {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: SessionStatus::InProgress,
            });
        }
        self.status = SessionStatus::InProgress;
        self.started_at = Some(started_at);
        Ok(())
    }

    /// Store or replace the answer for one question. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside the active phase and
    /// `SessionError::UnknownQuestion` for a question not in this session.
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        record: AnswerRecord,
    ) -> Result<(), SessionError> {
        if self.status != SessionStatus::InProgress {
            return Err(SessionError::NotInProgress);
        }
        if self.question(question_id).is_none() {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        self.answers.insert(question_id, record);
        Ok(())
    }

    /// Transition to `Completed`, merging the backend's graded answers.
    ///
    /// Graded records replace local ones; local answers the backend did not
    /// echo back are kept as-is.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless in progress, and
    /// `SessionError::UnknownQuestion` if grading references a question that
    /// is not part of this session.
    pub fn complete(
        &mut self,
        graded: HashMap<QuestionId, AnswerRecord>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        if !self.status.can_transition_to(SessionStatus::Completed) {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Completed,
            });
        }
        for question_id in graded.keys() {
            if self.question(*question_id).is_none() {
                return Err(SessionError::UnknownQuestion(*question_id));
            }
        }

        self.answers.extend(graded);
        self.status = SessionStatus::Completed;
        self.completed_at = Some(completed_at);
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
