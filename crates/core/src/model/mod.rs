mod answer;
mod ids;
mod question;
mod session;
mod summary;

pub use answer::{AnswerError, AnswerOption, AnswerRecord};
pub use ids::{ParseIdError, QuestionId, SessionId};
pub use question::{Question, QuestionError};
pub use session::{QuizSession, SessionError, SessionStatus};
pub use summary::{AttemptSummary, SummaryError};
