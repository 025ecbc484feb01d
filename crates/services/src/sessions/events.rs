use tokio::sync::mpsc;

use quiz_core::model::{AttemptSummary, QuestionId};

/// Asynchronous notifications pushed to the presentation layer.
///
/// Everything the UI can poll lives in `AttemptView`; events cover what
/// happens between polls: deadline expiry, fire-and-forget submission
/// failures, and completion resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    /// The deadline elapsed; an automatic submission is about to run.
    TimeExpired,

    /// A fire-and-forget answer submission was rejected by the backend.
    /// Navigation and the countdown are unaffected.
    AnswerRejected { question_id: QuestionId },

    /// The session reached its terminal state.
    Completed { summary: AttemptSummary },

    /// A completion request failed. `incomplete` marks the backend's
    /// unanswered-questions rejection, which the UI reports differently
    /// from a transient failure.
    CompletionFailed { incomplete: bool },
}

pub type EventSender = mpsc::UnboundedSender<AttemptEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<AttemptEvent>;
