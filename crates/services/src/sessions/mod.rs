mod attempt;
mod controller;
mod events;
mod progress;
mod view;

// Public API of the session subsystem.
pub use crate::error::{AttemptError, ControllerError};
pub use attempt::QuizAttempt;
pub use controller::{CompletionOutcome, QuizSessionController};
pub use events::{AttemptEvent, EventReceiver, EventSender};
pub use progress::AttemptProgress;
pub use view::AttemptView;
