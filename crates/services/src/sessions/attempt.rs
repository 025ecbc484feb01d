use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;

use backend::AnswerSubmission;
use quiz_core::model::{
    AnswerOption, AnswerRecord, AttemptSummary, Question, QuestionId, QuizSession, SessionStatus,
};
use quiz_core::time::elapsed_seconds;

use crate::error::AttemptError;
use super::progress::AttemptProgress;

/// Share of the duration below which the remaining time counts as a warning.
/// Purely a derived value for presentation; it gates no transition.
const TIME_WARNING_DIVISOR: i64 = 5;

//
// ─── ATTEMPT ──────────────────────────────────────────────────────────────────
//

/// In-memory state machine for one quiz attempt.
///
/// Owns the session aggregate plus the working state around it: the question
/// currently on screen, when it was shown (for per-question timing), the
/// flagged-question annotations, and the auto-submit marker. All methods are
/// synchronous and take explicit timestamps, so the whole machine is
/// deterministic under test.
pub struct QuizAttempt {
    session: QuizSession,
    current: usize,
    question_shown_at: DateTime<Utc>,
    flagged: HashSet<QuestionId>,
    auto_submitting: bool,
}

impl QuizAttempt {
    #[must_use]
    pub fn new(session: QuizSession, now: DateTime<Utc>) -> Self {
        Self {
            session,
            current: 0,
            question_shown_at: now,
            flagged: HashSet::new(),
            auto_submitting: false,
        }
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.session.question_at(self.current)
    }

    #[must_use]
    pub fn flagged(&self) -> &HashSet<QuestionId> {
        &self.flagged
    }

    /// Set once the deadline has fired; stays set so the presentation layer
    /// keeps showing a submitting state rather than reverting to an
    /// interactive attempt whose time has already run out.
    #[must_use]
    pub fn is_auto_submitting(&self) -> bool {
        self.auto_submitting
    }

    #[must_use]
    pub fn progress(&self) -> AttemptProgress {
        AttemptProgress {
            total: self.session.questions().len(),
            answered: self.session.answered_count(),
            unanswered: self.session.unanswered_count(),
            is_complete: self.status() == SessionStatus::Completed,
        }
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.session.unanswered_count()
    }

    //
    // ─── LIFECYCLE ────────────────────────────────────────────────────────
    //

    /// Enter the active phase with the backend's authoritative start time.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Session` unless the session is pending.
    pub fn begin(&mut self, started_at: DateTime<Utc>) -> Result<(), AttemptError> {
        self.session.begin(started_at)?;
        self.question_shown_at = started_at;
        Ok(())
    }

    /// Record a local answer for a question. Last write wins; nothing is
    /// sent to the backend until the answer is committed.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Session` outside the active phase or for an
    /// unknown question.
    pub fn select_answer(
        &mut self,
        question_id: QuestionId,
        option: AnswerOption,
    ) -> Result<(), AttemptError> {
        self.session
            .record_answer(question_id, AnswerRecord::selected(option))?;
        Ok(())
    }

    /// Produce the submission payload for the current question, stamping the
    /// answer with the time elapsed since the question was shown.
    ///
    /// Returns `None` when the attempt is not active or the current question
    /// has no local answer yet. Committing again after revisiting a question
    /// is fine; the backend keys submissions by question.
    pub fn take_commitment(&mut self, now: DateTime<Utc>) -> Option<AnswerSubmission> {
        if self.status() != SessionStatus::InProgress {
            return None;
        }
        let question_id = self.current_question()?.id();
        let record = *self.session.answers().get(&question_id)?;

        let elapsed = elapsed_seconds(self.question_shown_at, now);
        let stamped = record.with_time(elapsed);
        // cannot fail: status and question were just checked
        self.session.record_answer(question_id, stamped).ok()?;

        Some(AnswerSubmission {
            question_id,
            selected_option: stamped.selected_option,
            time_taken_seconds: elapsed,
        })
    }

    //
    // ─── NAVIGATION ───────────────────────────────────────────────────────
    //

    /// Move to the question at `index`, committing the outgoing question's
    /// answer if it has one. Out-of-range (or same-index) targets are no-ops.
    ///
    /// Returns the commitment to dispatch, if any.
    pub fn go_to(&mut self, index: usize, now: DateTime<Utc>) -> Option<AnswerSubmission> {
        if index == self.current || index >= self.session.questions().len() {
            return None;
        }
        let committed = self.take_commitment(now);
        self.current = index;
        self.question_shown_at = now;
        committed
    }

    /// Advance to the next question, if there is one.
    pub fn next(&mut self, now: DateTime<Utc>) -> Option<AnswerSubmission> {
        self.go_to(self.current + 1, now)
    }

    /// Step back to the previous question, if there is one.
    pub fn previous(&mut self, now: DateTime<Utc>) -> Option<AnswerSubmission> {
        let target = self.current.checked_sub(1)?;
        self.go_to(target, now)
    }

    //
    // ─── FLAGS ────────────────────────────────────────────────────────────
    //

    /// Mark a question for later review. Purely a UI annotation, orthogonal
    /// to the answer state. Returns false for unknown questions.
    pub fn flag(&mut self, question_id: QuestionId) -> bool {
        if self.session.question(question_id).is_none() {
            return false;
        }
        self.flagged.insert(question_id)
    }

    pub fn unflag(&mut self, question_id: QuestionId) -> bool {
        self.flagged.remove(&question_id)
    }

    //
    // ─── TIMING ───────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.session.deadline()
    }

    /// Time left on the clock, floored at zero. `None` before start.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.session.remaining(now)
    }

    /// True once the deadline has elapsed on an active attempt.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status() == SessionStatus::InProgress
            && self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// True while the remaining time is under a fifth of the duration.
    #[must_use]
    pub fn is_time_warning(&self, now: DateTime<Utc>) -> bool {
        if self.status() != SessionStatus::InProgress {
            return false;
        }
        let Some(remaining) = self.remaining(now) else {
            return false;
        };
        let threshold_ms = i64::from(self.session.duration_seconds()) * 1000 / TIME_WARNING_DIVISOR;
        remaining.num_milliseconds() < threshold_ms
    }

    /// Claim the auto-submit marker. Returns true only for the first claim,
    /// so the deadline notification fires once.
    pub fn mark_auto_submitting(&mut self) -> bool {
        !std::mem::replace(&mut self.auto_submitting, true)
    }

    //
    // ─── COMPLETION ───────────────────────────────────────────────────────
    //

    /// Apply the backend's terminal record: merge graded answers and move to
    /// `Completed`.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Session` if the session is not in progress.
    pub fn apply_completion(
        &mut self,
        graded: HashMap<QuestionId, AnswerRecord>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), AttemptError> {
        self.session.complete(graded, completed_at)?;
        Ok(())
    }

    /// Build the attempt summary for a completed session.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Summary` unless the session is terminal.
    pub fn summary(&self) -> Result<AttemptSummary, AttemptError> {
        Ok(AttemptSummary::from_session(&self.session)?)
    }
}

impl fmt::Debug for QuizAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizAttempt")
            .field("session_id", &self.session.id())
            .field("status", &self.status())
            .field("current", &self.current)
            .field("answered", &self.session.answered_count())
            .field("flagged", &self.flagged.len())
            .field("auto_submitting", &self.auto_submitting)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{SessionId, SessionStatus};
    use quiz_core::time::fixed_now;

    fn build_question(label: &str) -> Question {
        Question::new(
            QuestionId::random(),
            label,
            ["a", "b", "c", "d"].map(str::to_string),
            Some(AnswerOption::A),
        )
        .unwrap()
    }

    fn build_attempt(question_count: usize, duration_seconds: u32) -> QuizAttempt {
        let questions = (0..question_count)
            .map(|i| build_question(&format!("Q{i}")))
            .collect();
        let session = QuizSession::new(SessionId::random(), duration_seconds, questions).unwrap();
        QuizAttempt::new(session, fixed_now())
    }

    fn started_attempt(question_count: usize, duration_seconds: u32) -> QuizAttempt {
        let mut attempt = build_attempt(question_count, duration_seconds);
        attempt.begin(fixed_now()).unwrap();
        attempt
    }

    #[test]
    fn selecting_twice_leaves_a_single_answer() {
        let mut attempt = started_attempt(2, 600);
        let question_id = attempt.current_question().unwrap().id();

        attempt.select_answer(question_id, AnswerOption::A).unwrap();
        attempt.select_answer(question_id, AnswerOption::A).unwrap();

        assert_eq!(attempt.session().answered_count(), 1);
        assert_eq!(
            attempt.session().answers()[&question_id].selected_option,
            AnswerOption::A
        );
    }

    #[test]
    fn selection_outside_active_phase_is_rejected() {
        let mut attempt = build_attempt(1, 600);
        let question_id = attempt.current_question().unwrap().id();
        assert!(attempt.select_answer(question_id, AnswerOption::B).is_err());
    }

    #[test]
    fn commitment_measures_time_since_question_shown() {
        let mut attempt = started_attempt(2, 600);
        let now = fixed_now();
        let first = attempt.current_question().unwrap().id();
        attempt.select_answer(first, AnswerOption::C).unwrap();

        let submission = attempt.take_commitment(now + Duration::seconds(23)).unwrap();
        assert_eq!(submission.question_id, first);
        assert_eq!(submission.selected_option, AnswerOption::C);
        assert_eq!(submission.time_taken_seconds, 23);
        assert_eq!(
            attempt.session().answers()[&first].time_taken_seconds,
            23
        );
    }

    #[test]
    fn commitment_without_answer_is_none() {
        let mut attempt = started_attempt(1, 600);
        assert!(attempt.take_commitment(fixed_now()).is_none());
    }

    #[test]
    fn navigation_commits_and_resets_question_timer() {
        let mut attempt = started_attempt(3, 600);
        let now = fixed_now();
        let first = attempt.current_question().unwrap().id();
        attempt.select_answer(first, AnswerOption::B).unwrap();

        let committed = attempt.next(now + Duration::seconds(10)).unwrap();
        assert_eq!(committed.question_id, first);
        assert_eq!(committed.time_taken_seconds, 10);
        assert_eq!(attempt.current_index(), 1);

        // second question's timer starts at the navigation instant
        let second = attempt.current_question().unwrap().id();
        attempt.select_answer(second, AnswerOption::D).unwrap();
        let committed = attempt
            .previous(now + Duration::seconds(14))
            .unwrap();
        assert_eq!(committed.question_id, second);
        assert_eq!(committed.time_taken_seconds, 4);
        assert_eq!(attempt.current_index(), 0);
    }

    #[test]
    fn out_of_range_navigation_is_a_no_op() {
        let mut attempt = started_attempt(2, 600);
        let now = fixed_now();

        assert!(attempt.go_to(5, now).is_none());
        assert_eq!(attempt.current_index(), 0);

        assert!(attempt.previous(now).is_none());
        assert_eq!(attempt.current_index(), 0);

        attempt.next(now);
        assert!(attempt.next(now).is_none());
        assert_eq!(attempt.current_index(), 1);
    }

    #[test]
    fn unanswered_navigation_commits_nothing() {
        let mut attempt = started_attempt(2, 600);
        assert!(attempt.next(fixed_now()).is_none());
        assert_eq!(attempt.current_index(), 1);
    }

    #[test]
    fn expiry_and_warning_follow_the_deadline() {
        let attempt = started_attempt(1, 600);
        let start = fixed_now();

        assert!(!attempt.is_expired(start + Duration::seconds(599)));
        assert!(attempt.is_expired(start + Duration::seconds(600)));

        // warning threshold is a fifth of the duration
        assert!(!attempt.is_time_warning(start + Duration::seconds(479)));
        assert!(attempt.is_time_warning(start + Duration::seconds(481)));
    }

    #[test]
    fn auto_submit_marker_claims_once() {
        let mut attempt = started_attempt(1, 600);
        assert!(attempt.mark_auto_submitting());
        assert!(!attempt.mark_auto_submitting());
        assert!(attempt.is_auto_submitting());
    }

    #[test]
    fn flags_are_orthogonal_to_answers() {
        let mut attempt = started_attempt(2, 600);
        let question_id = attempt.current_question().unwrap().id();

        assert!(attempt.flag(question_id));
        assert!(!attempt.flag(question_id));
        assert!(!attempt.flag(QuestionId::random()));
        assert_eq!(attempt.progress().answered, 0);

        assert!(attempt.unflag(question_id));
        assert!(attempt.flagged().is_empty());
    }

    #[test]
    fn completion_is_terminal() {
        let mut attempt = started_attempt(1, 600);
        let question_id = attempt.current_question().unwrap().id();
        attempt.select_answer(question_id, AnswerOption::A).unwrap();

        let graded = HashMap::from([(
            question_id,
            AnswerRecord::selected(AnswerOption::A).graded(true),
        )]);
        attempt
            .apply_completion(graded, fixed_now() + Duration::seconds(30))
            .unwrap();

        assert_eq!(attempt.status(), SessionStatus::Completed);
        assert!(attempt.select_answer(question_id, AnswerOption::B).is_err());
        assert!(attempt.take_commitment(fixed_now()).is_none());
        assert!(attempt
            .apply_completion(HashMap::new(), fixed_now())
            .is_err());

        let summary = attempt.summary().unwrap();
        assert_eq!(summary.correct(), 1);
        assert_eq!(summary.unanswered(), 0);
    }

    #[test]
    fn summary_requires_completion() {
        let attempt = started_attempt(1, 600);
        assert!(attempt.summary().is_err());
    }
}
