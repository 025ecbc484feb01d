use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use backend::{AnswerSubmission, QuizBackend, SessionRecord};
use quiz_core::Clock;
use quiz_core::model::{AnswerOption, AttemptSummary, QuestionId, SessionId, SessionStatus};

use crate::error::{AttemptError, ControllerError};
use super::attempt::QuizAttempt;
use super::events::{AttemptEvent, EventReceiver, EventSender};
use super::progress::AttemptProgress;
use super::view::AttemptView;

/// Default cadence for the deadline check.
const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Fixed pause between the deadline firing and the automatic submission,
/// leaving room for a final in-flight answer commit.
const DEFAULT_GRACE: Duration = Duration::from_secs(2);

//
// ─── COMPLETION OUTCOME ───────────────────────────────────────────────────────
//

/// How a completion request resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// This call performed the completion.
    Completed(AttemptSummary),

    /// The session was already terminal; nothing was sent.
    AlreadyCompleted,

    /// Another completion holds the in-flight claim; this call was a no-op.
    InFlight,

    /// The session has not been started; nothing was sent.
    NotStarted,
}

//
// ─── CONTROLLER ───────────────────────────────────────────────────────────────
//

/// Coordinates timing, local answer state, and exactly-once submission for
/// one quiz attempt.
///
/// The controller owns the deadline timer and the completion claim. Cloning
/// yields another handle to the same attempt; `dispose` (or dropping every
/// handle) stops the timer and detaches any in-flight resolutions.
#[derive(Clone)]
pub struct QuizSessionController {
    inner: Arc<ControllerInner>,
    tick: Duration,
    grace: Duration,
}

struct ControllerInner {
    backend: Arc<dyn QuizBackend>,
    clock: Clock,
    session_id: SessionId,
    attempt: Mutex<QuizAttempt>,
    start_in_flight: AtomicBool,
    completion_in_flight: AtomicBool,
    alive: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
    events: EventSender,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        let slot = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl QuizSessionController {
    /// Build a controller around an already-fetched session record.
    ///
    /// Must be called inside a Tokio runtime; resuming an in-progress
    /// session spawns the deadline timer immediately.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Record` when the record does not form a
    /// consistent session.
    pub fn new(
        backend: Arc<dyn QuizBackend>,
        clock: Clock,
        record: SessionRecord,
    ) -> Result<(Self, EventReceiver), ControllerError> {
        let session = record.into_session()?;
        let session_id = session.id();
        let status = session.status();
        let attempt = QuizAttempt::new(session, clock.now());
        let (events, receiver) = mpsc::unbounded_channel();

        let controller = Self {
            inner: Arc::new(ControllerInner {
                backend,
                clock,
                session_id,
                attempt: Mutex::new(attempt),
                start_in_flight: AtomicBool::new(false),
                completion_in_flight: AtomicBool::new(false),
                alive: AtomicBool::new(true),
                timer: Mutex::new(None),
                events,
            }),
            tick: DEFAULT_TICK,
            grace: DEFAULT_GRACE,
        };

        if status == SessionStatus::InProgress {
            controller.spawn_timer();
        }
        Ok((controller, receiver))
    }

    /// Fetch the session from the backend and build a controller, resuming
    /// whatever state the backend reports.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Backend` when the fetch fails.
    pub async fn load(
        backend: Arc<dyn QuizBackend>,
        clock: Clock,
        session_id: SessionId,
    ) -> Result<(Self, EventReceiver), ControllerError> {
        let record = backend.get_quiz(session_id).await?;
        Self::new(backend, clock, record)
    }

    /// Override the deadline check cadence. Intended for tests.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self.respawn_if_running();
        self
    }

    /// Override the grace delay between deadline expiry and auto-submit.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self.respawn_if_running();
        self
    }

    /// A timer spawned on construction (resumed session) keeps the cadence
    /// it was spawned with; restart it so builder overrides take effect.
    fn respawn_if_running(&self) {
        let running = {
            let slot = self
                .inner
                .timer
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slot.is_some()
        };
        if running {
            self.spawn_timer();
        }
    }

    fn attempt(&self) -> MutexGuard<'_, QuizAttempt> {
        self.inner
            .attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.attempt().status()
    }

    /// Snapshot of the attempt for rendering.
    #[must_use]
    pub fn view(&self) -> AttemptView {
        let now = self.inner.clock.now();
        AttemptView::from_attempt(&self.attempt(), now)
    }

    //
    // ─── START ────────────────────────────────────────────────────────────
    //

    /// Start a pending session.
    ///
    /// The backend's `started_at` is adopted as the authoritative start
    /// time, so a skewed client clock cannot stretch the deadline. Repeated
    /// calls while a start is outstanding, or once the session is active,
    /// are no-ops returning the current view.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Backend` when the start request fails; the
    /// session stays pending and the call is safe to retry.
    pub async fn start(&self) -> Result<AttemptView, ControllerError> {
        if self.attempt().status() != SessionStatus::Pending {
            return Ok(self.view());
        }
        if self
            .inner
            .start_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(self.view());
        }

        let record = match self.inner.backend.start_quiz(self.inner.session_id).await {
            Ok(record) => record,
            Err(err) => {
                self.inner.start_in_flight.store(false, Ordering::SeqCst);
                return Err(err.into());
            }
        };

        let begun = {
            let mut attempt = self.attempt();
            match record.started_at {
                Some(started_at) => attempt.begin(started_at),
                None => Err(AttemptError::NotStarted),
            }
        };
        self.inner.start_in_flight.store(false, Ordering::SeqCst);
        begun?;

        self.spawn_timer();
        Ok(self.view())
    }

    //
    // ─── ANSWERS & NAVIGATION ─────────────────────────────────────────────
    //

    /// Record a local answer. Nothing is sent until the question is
    /// committed by navigation or completion. Stray calls outside the
    /// active phase are ignored.
    pub fn select_answer(&self, question_id: QuestionId, option: AnswerOption) {
        let result = self.attempt().select_answer(question_id, option);
        if let Err(err) = result {
            tracing::debug!(%question_id, error = %err, "ignoring answer outside active attempt");
        }
    }

    /// Move to the question at `index`, committing the outgoing answer.
    /// Out-of-range targets are ignored.
    pub fn go_to(&self, index: usize) {
        let now = self.inner.clock.now();
        let submission = self.attempt().go_to(index, now);
        self.dispatch(submission);
    }

    /// Advance to the next question, committing the outgoing answer.
    pub fn next(&self) {
        let now = self.inner.clock.now();
        let submission = self.attempt().next(now);
        self.dispatch(submission);
    }

    /// Step back to the previous question, committing the outgoing answer.
    pub fn previous(&self) {
        let now = self.inner.clock.now();
        let submission = self.attempt().previous(now);
        self.dispatch(submission);
    }

    /// Mark a question for later review.
    pub fn flag_question(&self, question_id: QuestionId) {
        self.attempt().flag(question_id);
    }

    pub fn unflag_question(&self, question_id: QuestionId) {
        self.attempt().unflag(question_id);
    }

    /// Send a committed answer without blocking navigation or the timer.
    ///
    /// Failures are reported through the event channel; a slow network must
    /// never stall the user's remaining time. Responses are keyed by
    /// question on the server, so late arrivals cannot corrupt local state.
    fn dispatch(&self, submission: Option<AnswerSubmission>) {
        let Some(submission) = submission else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let question_id = submission.question_id;
            if let Err(err) = inner.backend.submit_answer(inner.session_id, submission).await {
                if !inner.alive.load(Ordering::SeqCst) {
                    return;
                }
                tracing::warn!(%question_id, error = %err, "answer submission failed");
                let _ = inner
                    .events
                    .send(AttemptEvent::AnswerRejected { question_id });
            }
        });
    }

    //
    // ─── COMPLETION ───────────────────────────────────────────────────────
    //

    /// Progress snapshot for the submit-confirmation dialog.
    ///
    /// The controller reports how many questions are open but does not
    /// block an incomplete submission; the backend is the final arbiter.
    #[must_use]
    pub fn request_manual_complete(&self) -> AttemptProgress {
        self.attempt().progress()
    }

    /// Commit the current answer and submit the session for grading.
    ///
    /// Exactly one completion request can be in flight or have succeeded;
    /// racing calls (double-click, timeout firing alongside a manual
    /// submit) observe the claim and resolve to a no-op outcome.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Backend` when the completion request
    /// fails. The claim is released, so the call may be retried; an
    /// `IncompleteAnswers` rejection is distinguishable via
    /// [`ControllerError::is_incomplete`].
    pub async fn complete(&self) -> Result<CompletionOutcome, ControllerError> {
        match self.attempt().status() {
            SessionStatus::Completed => return Ok(CompletionOutcome::AlreadyCompleted),
            SessionStatus::Pending => return Ok(CompletionOutcome::NotStarted),
            SessionStatus::InProgress => {}
        }
        // the claim must be taken before the first await so two racing
        // callers cannot both pass the check
        if self
            .inner
            .completion_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(CompletionOutcome::InFlight);
        }

        // the final commit is awaited (unlike navigation commits) so grading
        // sees the answer for the question on screen; a failure is reported
        // but does not block the completion itself
        let now = self.inner.clock.now();
        let submission = self.attempt().take_commitment(now);
        if let Some(submission) = submission {
            let question_id = submission.question_id;
            if let Err(err) = self
                .inner
                .backend
                .submit_answer(self.inner.session_id, submission)
                .await
            {
                if self.inner.alive.load(Ordering::SeqCst) {
                    tracing::warn!(%question_id, error = %err, "final answer submission failed");
                    let _ = self
                        .inner
                        .events
                        .send(AttemptEvent::AnswerRejected { question_id });
                }
            }
        }

        self.finish().await
    }

    async fn finish(&self) -> Result<CompletionOutcome, ControllerError> {
        let result = self.inner.backend.complete_quiz(self.inner.session_id).await;
        if !self.inner.alive.load(Ordering::SeqCst) {
            // torn down while the request was in flight; drop the resolution
            return Ok(CompletionOutcome::InFlight);
        }

        match result {
            Ok(record) => {
                let now = self.inner.clock.now();
                let summary = {
                    let mut attempt = self.attempt();
                    let completed_at = record.completed_at.unwrap_or(now);
                    attempt.apply_completion(record.answer_map(), completed_at)?;
                    attempt.summary()?
                };
                self.cancel_timer();
                let _ = self.inner.events.send(AttemptEvent::Completed {
                    summary: summary.clone(),
                });
                Ok(CompletionOutcome::Completed(summary))
            }
            Err(err) => {
                let incomplete = err.is_incomplete();
                // release the claim so a retry (manual or the next timer
                // tick) can submit again; the auto-submitting marker is
                // deliberately left as-is, so a timed-out attempt keeps
                // showing a submitting state
                self.inner
                    .completion_in_flight
                    .store(false, Ordering::SeqCst);
                let _ = self
                    .inner
                    .events
                    .send(AttemptEvent::CompletionFailed { incomplete });
                Err(err.into())
            }
        }
    }

    //
    // ─── DEADLINE TIMER ───────────────────────────────────────────────────
    //

    fn spawn_timer(&self) {
        let weak: Weak<ControllerInner> = Arc::downgrade(&self.inner);
        let tick = self.tick;
        let grace = self.grace;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let controller = QuizSessionController { inner, tick, grace };

                if !controller.inner.alive.load(Ordering::SeqCst) {
                    break;
                }
                let now = controller.inner.clock.now();
                let (status, expired) = {
                    let attempt = controller.attempt();
                    (attempt.status(), attempt.is_expired(now))
                };
                if status != SessionStatus::InProgress {
                    break;
                }
                if !expired {
                    continue;
                }
                if controller.inner.completion_in_flight.load(Ordering::SeqCst) {
                    // a completion is resolving; keep ticking until the
                    // session turns terminal or the claim is released
                    continue;
                }

                let first_claim = controller.attempt().mark_auto_submitting();
                if first_claim {
                    let _ = controller.inner.events.send(AttemptEvent::TimeExpired);
                }
                tokio::time::sleep(grace).await;

                if let Err(err) = controller.complete().await {
                    tracing::warn!(
                        session = %controller.inner.session_id,
                        error = %err,
                        "automatic submission failed"
                    );
                }
            }
        });

        let mut slot = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    fn cancel_timer(&self) {
        let mut slot = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    /// Tear down the controller: stops the deadline timer and prevents any
    /// in-flight resolution from mutating state or emitting events.
    ///
    /// In-flight HTTP requests are left to finish on their own; their
    /// results are discarded.
    pub fn dispose(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        self.cancel_timer();
    }
}
