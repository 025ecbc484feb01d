#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use quiz_core::Clock;

pub use error::{AttemptError, ControllerError};
pub use sessions::{
    AttemptEvent, AttemptProgress, AttemptView, CompletionOutcome, EventReceiver, EventSender,
    QuizAttempt, QuizSessionController,
};
