use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur when converting answer options.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnswerError {
    #[error("invalid answer option: {0}")]
    InvalidOption(String),
}

//
// ─── ANSWER OPTION ────────────────────────────────────────────────────────────
//

/// One of the four choices presented for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    /// All options in display order.
    pub const ALL: [AnswerOption; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Converts a single-letter label ("A" through "D") to an option.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::InvalidOption` for anything else.
    pub fn from_letter(value: &str) -> Result<Self, AnswerError> {
        match value.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            "C" | "c" => Ok(Self::C),
            "D" | "d" => Ok(Self::D),
            other => Err(AnswerError::InvalidOption(other.to_string())),
        }
    }

    /// Returns the single-letter label for this option.
    #[must_use]
    pub fn as_letter(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    /// Position of this option in a question's option list.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_letter())
    }
}

impl FromStr for AnswerOption {
    type Err = AnswerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_letter(s)
    }
}

//
// ─── ANSWER RECORD ────────────────────────────────────────────────────────────
//

/// Locally captured answer for a single question.
///
/// `time_taken_seconds` is the wall-clock delta between the question being
/// shown and the answer being committed. `is_correct` stays `None` until the
/// backend grades the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub selected_option: AnswerOption,
    pub time_taken_seconds: u32,
    pub is_correct: Option<bool>,
}

impl AnswerRecord {
    /// A freshly selected answer with no timing or grading applied yet.
    #[must_use]
    pub fn selected(option: AnswerOption) -> Self {
        Self {
            selected_option: option,
            time_taken_seconds: 0,
            is_correct: None,
        }
    }

    /// Returns this record with the measured answer time.
    #[must_use]
    pub fn with_time(mut self, seconds: u32) -> Self {
        self.time_taken_seconds = seconds;
        self
    }

    /// Returns this record with the backend's grading applied.
    #[must_use]
    pub fn graded(mut self, correct: bool) -> Self {
        self.is_correct = Some(correct);
        self
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_conversion_works() {
        assert_eq!(AnswerOption::from_letter("A").unwrap(), AnswerOption::A);
        assert_eq!(AnswerOption::from_letter(" d ").unwrap(), AnswerOption::D);
        let err = AnswerOption::from_letter("E").unwrap_err();
        assert!(matches!(err, AnswerError::InvalidOption(_)));
    }

    #[test]
    fn letter_roundtrip() {
        for option in AnswerOption::ALL {
            assert_eq!(option.as_letter().parse::<AnswerOption>().unwrap(), option);
        }
    }

    #[test]
    fn index_matches_display_order() {
        assert_eq!(AnswerOption::A.index(), 0);
        assert_eq!(AnswerOption::D.index(), 3);
    }

    #[test]
    fn record_builders_compose() {
        let record = AnswerRecord::selected(AnswerOption::B)
            .with_time(17)
            .graded(true);
        assert_eq!(record.selected_option, AnswerOption::B);
        assert_eq!(record.time_taken_seconds, 17);
        assert_eq!(record.is_correct, Some(true));
    }

    #[test]
    fn fresh_record_is_ungraded() {
        let record = AnswerRecord::selected(AnswerOption::C);
        assert_eq!(record.time_taken_seconds, 0);
        assert_eq!(record.is_correct, None);
    }
}
