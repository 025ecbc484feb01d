use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::StatusCode;

use quiz_core::Clock;
use quiz_core::model::{AnswerRecord, QuestionId, QuizSession, SessionId, SessionStatus};

use crate::api::{AnswerSubmission, BackendError, QuizBackend};
use crate::record::SessionRecord;

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<SessionId, QuizSession>,
    start_calls: HashMap<SessionId, u32>,
    completion_calls: HashMap<SessionId, u32>,
    failing_completions: u32,
}

/// In-memory quiz backend for tests and prototyping.
///
/// Grades answers on completion from the stored questions' correct options,
/// and counts start/completion calls so callers can assert exactly-once
/// behavior. Completion failures can be injected to exercise retry paths.
#[derive(Clone)]
pub struct InMemoryBackend {
    clock: Clock,
    strict_completion: bool,
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            strict_completion: false,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Reject completion with `IncompleteAnswers` while questions are open,
    /// mirroring a backend that enforces completeness server-side.
    #[must_use]
    pub fn with_strict_completion(mut self, strict: bool) -> Self {
        self.strict_completion = strict;
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a session. Tests typically insert a pending session with the
    /// correct options filled in on its questions.
    pub fn insert_session(&self, session: QuizSession) {
        self.state().sessions.insert(session.id(), session);
    }

    /// Snapshot of a stored session, for assertions.
    #[must_use]
    pub fn session(&self, id: SessionId) -> Option<QuizSession> {
        self.state().sessions.get(&id).cloned()
    }

    /// How many times `start_quiz` was invoked for this session.
    #[must_use]
    pub fn start_calls(&self, id: SessionId) -> u32 {
        self.state().start_calls.get(&id).copied().unwrap_or(0)
    }

    /// How many times `complete_quiz` was invoked for this session,
    /// including injected failures.
    #[must_use]
    pub fn completion_calls(&self, id: SessionId) -> u32 {
        self.state().completion_calls.get(&id).copied().unwrap_or(0)
    }

    /// Make the next `count` completion calls fail with a 500 status.
    pub fn fail_next_completions(&self, count: u32) {
        self.state().failing_completions = count;
    }

    fn grade(session: &QuizSession) -> HashMap<QuestionId, AnswerRecord> {
        session
            .answers()
            .iter()
            .map(|(question_id, record)| {
                let correct = session
                    .question(*question_id)
                    .and_then(|question| question.correct_option())
                    .map(|correct| correct == record.selected_option);
                let graded = match correct {
                    Some(is_correct) => record.graded(is_correct),
                    None => *record,
                };
                (*question_id, graded)
            })
            .collect()
    }
}

#[async_trait]
impl QuizBackend for InMemoryBackend {
    async fn start_quiz(&self, id: SessionId) -> Result<SessionRecord, BackendError> {
        let now = self.clock.now();
        let mut state = self.state();
        *state.start_calls.entry(id).or_insert(0) += 1;

        let session = state.sessions.get_mut(&id).ok_or(BackendError::NotFound)?;
        if session.status() == SessionStatus::Pending {
            session
                .begin(now)
                .map_err(|err| BackendError::Conflict(err.to_string()))?;
        }
        Ok(SessionRecord::from_session(session))
    }

    async fn submit_answer(
        &self,
        id: SessionId,
        answer: AnswerSubmission,
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        let session = state.sessions.get_mut(&id).ok_or(BackendError::NotFound)?;
        session
            .record_answer(
                answer.question_id,
                AnswerRecord {
                    selected_option: answer.selected_option,
                    time_taken_seconds: answer.time_taken_seconds,
                    is_correct: None,
                },
            )
            .map_err(|err| BackendError::Conflict(err.to_string()))
    }

    async fn complete_quiz(&self, id: SessionId) -> Result<SessionRecord, BackendError> {
        let now = self.clock.now();
        let mut state = self.state();
        *state.completion_calls.entry(id).or_insert(0) += 1;

        if state.failing_completions > 0 {
            state.failing_completions -= 1;
            return Err(BackendError::Status(StatusCode::INTERNAL_SERVER_ERROR));
        }

        let strict = self.strict_completion;
        let session = state.sessions.get_mut(&id).ok_or(BackendError::NotFound)?;
        if strict && session.unanswered_count() > 0 {
            let unanswered = u32::try_from(session.unanswered_count()).unwrap_or(u32::MAX);
            return Err(BackendError::IncompleteAnswers { unanswered });
        }

        let graded = Self::grade(session);
        session
            .complete(graded, now)
            .map_err(|err| BackendError::Conflict(err.to_string()))?;
        Ok(SessionRecord::from_session(session))
    }

    async fn get_quiz(&self, id: SessionId) -> Result<SessionRecord, BackendError> {
        let state = self.state();
        let session = state.sessions.get(&id).ok_or(BackendError::NotFound)?;
        Ok(SessionRecord::from_session(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{AnswerOption, Question};
    use quiz_core::time::{fixed_clock, fixed_now};

    fn build_session(question_count: usize) -> QuizSession {
        let questions = (0..question_count)
            .map(|i| {
                Question::new(
                    QuestionId::random(),
                    format!("Q{i}"),
                    ["a", "b", "c", "d"].map(str::to_string),
                    Some(AnswerOption::A),
                )
                .unwrap()
            })
            .collect();
        QuizSession::new(SessionId::random(), 300, questions).unwrap()
    }

    fn submission(question_id: QuestionId, option: AnswerOption) -> AnswerSubmission {
        AnswerSubmission {
            question_id,
            selected_option: option,
            time_taken_seconds: 7,
        }
    }

    #[tokio::test]
    async fn start_sets_authoritative_started_at() {
        let backend = InMemoryBackend::new(fixed_clock());
        let session = build_session(1);
        let id = session.id();
        backend.insert_session(session);

        let record = backend.start_quiz(id).await.unwrap();
        assert_eq!(record.status, SessionStatus::InProgress);
        assert_eq!(record.started_at, Some(fixed_now()));
        assert_eq!(backend.start_calls(id), 1);

        // a repeated start is tolerated and does not reset the timestamp
        let record = backend.start_quiz(id).await.unwrap();
        assert_eq!(record.started_at, Some(fixed_now()));
        assert_eq!(backend.start_calls(id), 2);
    }

    #[tokio::test]
    async fn completion_grades_against_correct_options() {
        let backend = InMemoryBackend::new(fixed_clock());
        let session = build_session(2);
        let id = session.id();
        let first = session.questions()[0].id();
        let second = session.questions()[1].id();
        backend.insert_session(session);

        backend.start_quiz(id).await.unwrap();
        backend
            .submit_answer(id, submission(first, AnswerOption::A))
            .await
            .unwrap();
        backend
            .submit_answer(id, submission(second, AnswerOption::C))
            .await
            .unwrap();

        let record = backend.complete_quiz(id).await.unwrap();
        assert_eq!(record.status, SessionStatus::Completed);
        let answers = record.answer_map();
        assert_eq!(answers[&first].is_correct, Some(true));
        assert_eq!(answers[&second].is_correct, Some(false));
        assert_eq!(backend.completion_calls(id), 1);
    }

    #[tokio::test]
    async fn strict_backend_rejects_incomplete_submission() {
        let backend = InMemoryBackend::new(fixed_clock()).with_strict_completion(true);
        let session = build_session(3);
        let id = session.id();
        let first = session.questions()[0].id();
        backend.insert_session(session);

        backend.start_quiz(id).await.unwrap();
        backend
            .submit_answer(id, submission(first, AnswerOption::A))
            .await
            .unwrap();

        let err = backend.complete_quiz(id).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::IncompleteAnswers { unanswered: 2 }
        ));
        // the session is still active; answering and retrying succeeds
        assert_eq!(
            backend.session(id).unwrap().status(),
            SessionStatus::InProgress
        );
    }

    #[tokio::test]
    async fn injected_failures_burn_down() {
        let backend = InMemoryBackend::new(fixed_clock());
        let session = build_session(1);
        let id = session.id();
        let question = session.questions()[0].id();
        backend.insert_session(session);

        backend.start_quiz(id).await.unwrap();
        backend
            .submit_answer(id, submission(question, AnswerOption::A))
            .await
            .unwrap();

        backend.fail_next_completions(1);
        assert!(matches!(
            backend.complete_quiz(id).await.unwrap_err(),
            BackendError::Status(_)
        ));
        assert!(backend.complete_quiz(id).await.is_ok());
        assert_eq!(backend.completion_calls(id), 2);
    }

    #[tokio::test]
    async fn answers_outside_active_phase_conflict() {
        let backend = InMemoryBackend::new(fixed_clock());
        let session = build_session(1);
        let id = session.id();
        let question = session.questions()[0].id();
        backend.insert_session(session);

        let err = backend
            .submit_answer(id, submission(question, AnswerOption::B))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let backend = InMemoryBackend::new(fixed_clock());
        let err = backend.get_quiz(SessionId::random()).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound));
    }
}
