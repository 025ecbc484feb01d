use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use quiz_core::model::{AnswerRecord, Question, QuestionId, SessionStatus};

use super::attempt::QuizAttempt;
use super::progress::AttemptProgress;

/// Presentation-agnostic snapshot of a quiz attempt.
///
/// This is intentionally **not** a UI view-model:
/// - no pre-formatted strings
/// - no localization assumptions
///
/// The UI decides how to render the countdown, the warning style, and the
/// answer sheet from these raw values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptView {
    pub status: SessionStatus,
    pub current_index: usize,
    pub current_question: Option<Question>,
    /// `None` until the session has started.
    pub time_remaining_ms: Option<i64>,
    pub is_time_warning: bool,
    pub is_auto_submitting: bool,
    pub answers: HashMap<QuestionId, AnswerRecord>,
    pub flagged: HashSet<QuestionId>,
    pub progress: AttemptProgress,
}

impl AttemptView {
    #[must_use]
    pub fn from_attempt(attempt: &QuizAttempt, now: DateTime<Utc>) -> Self {
        Self {
            status: attempt.status(),
            current_index: attempt.current_index(),
            current_question: attempt.current_question().cloned(),
            time_remaining_ms: attempt
                .remaining(now)
                .map(|remaining| remaining.num_milliseconds()),
            is_time_warning: attempt.is_time_warning(now),
            is_auto_submitting: attempt.is_auto_submitting(),
            answers: attempt.session().answers().clone(),
            flagged: attempt.flagged().clone(),
            progress: attempt.progress(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{AnswerOption, QuizSession, SessionId};
    use quiz_core::time::fixed_now;

    fn build_attempt() -> QuizAttempt {
        let questions = (0..2)
            .map(|i| {
                Question::new(
                    QuestionId::random(),
                    format!("Q{i}"),
                    ["a", "b", "c", "d"].map(str::to_string),
                    None,
                )
                .unwrap()
            })
            .collect();
        let session = QuizSession::new(SessionId::random(), 100, questions).unwrap();
        QuizAttempt::new(session, fixed_now())
    }

    #[test]
    fn pending_view_has_no_countdown() {
        let attempt = build_attempt();
        let view = AttemptView::from_attempt(&attempt, fixed_now());

        assert_eq!(view.status, SessionStatus::Pending);
        assert_eq!(view.time_remaining_ms, None);
        assert!(!view.is_time_warning);
        assert_eq!(view.progress.total, 2);
    }

    #[test]
    fn active_view_reflects_countdown_and_answers() {
        let mut attempt = build_attempt();
        let now = fixed_now();
        attempt.begin(now).unwrap();
        let question_id = attempt.current_question().unwrap().id();
        attempt.select_answer(question_id, AnswerOption::B).unwrap();

        let later = now + Duration::seconds(85);
        let view = AttemptView::from_attempt(&attempt, later);

        assert_eq!(view.status, SessionStatus::InProgress);
        assert_eq!(view.time_remaining_ms, Some(15_000));
        assert!(view.is_time_warning);
        assert_eq!(view.answers[&question_id].selected_option, AnswerOption::B);
        assert_eq!(view.progress.answered, 1);
        assert_eq!(view.progress.unanswered, 1);
    }
}
