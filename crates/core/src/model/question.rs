use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::answer::AnswerOption;
use crate::model::ids::QuestionId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised when building a question.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question text is empty")]
    EmptyText,

    #[error("option {0} is empty")]
    EmptyOption(AnswerOption),
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// A four-option multiple-choice question.
///
/// `correct_option` is only present once the backend reveals grading,
/// typically after the session completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: [String; 4],
    correct_option: Option<AnswerOption>,
}

impl Question {
    /// Build a question, validating that text and all options are non-blank.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyText` or `QuestionError::EmptyOption`.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: [String; 4],
        correct_option: Option<AnswerOption>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        for option in AnswerOption::ALL {
            if options[option.index()].trim().is_empty() {
                return Err(QuestionError::EmptyOption(option));
            }
        }

        Ok(Self {
            id,
            text,
            options,
            correct_option,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String; 4] {
        &self.options
    }

    /// Returns the display text for one option.
    #[must_use]
    pub fn option_text(&self, option: AnswerOption) -> &str {
        &self.options[option.index()]
    }

    #[must_use]
    pub fn correct_option(&self) -> Option<AnswerOption> {
        self.correct_option
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> [String; 4] {
        ["one", "two", "three", "four"].map(str::to_string)
    }

    #[test]
    fn question_fails_on_blank_text() {
        let err = Question::new(QuestionId::random(), "   ", options(), None).unwrap_err();
        assert_eq!(err, QuestionError::EmptyText);
    }

    #[test]
    fn question_fails_on_blank_option() {
        let mut opts = options();
        opts[2] = " ".to_string();
        let err = Question::new(QuestionId::random(), "Q", opts, None).unwrap_err();
        assert_eq!(err, QuestionError::EmptyOption(AnswerOption::C));
    }

    #[test]
    fn option_text_follows_display_order() {
        let question =
            Question::new(QuestionId::random(), "Q", options(), Some(AnswerOption::B)).unwrap();
        assert_eq!(question.option_text(AnswerOption::A), "one");
        assert_eq!(question.option_text(AnswerOption::D), "four");
        assert_eq!(question.correct_option(), Some(AnswerOption::B));
    }
}
