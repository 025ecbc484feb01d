#![forbid(unsafe_code)]

pub mod api;
pub mod http;
pub mod memory;
pub mod record;

pub use api::{AnswerSubmission, BackendError, QuizBackend};
pub use http::{HttpBackendConfig, HttpQuizBackend};
pub use memory::InMemoryBackend;
pub use record::{AnswerEntry, QuestionRecord, RecordError, SessionRecord};
