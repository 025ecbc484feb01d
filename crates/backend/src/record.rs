use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use quiz_core::model::{
    AnswerOption, AnswerRecord, Question, QuestionError, QuestionId, QuizSession, SessionError,
    SessionId, SessionStatus,
};

/// Errors raised while converting wire records into domain types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    #[error("invalid question in record: {0}")]
    Question(#[from] QuestionError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Wire shape for one question, as the remote API returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<AnswerOption>,
}

impl QuestionRecord {
    /// Convert the record into a validated domain `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` for blank text or options.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        Question::new(
            self.id,
            self.text,
            [self.option_a, self.option_b, self.option_c, self.option_d],
            self.correct_option,
        )
    }

    #[must_use]
    pub fn from_question(question: &Question) -> Self {
        let [a, b, c, d] = question.options().clone();
        Self {
            id: question.id(),
            text: question.text().to_owned(),
            option_a: a,
            option_b: b,
            option_c: c,
            option_d: d,
            correct_option: question.correct_option(),
        }
    }
}

/// Wire shape for one stored answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_id: QuestionId,
    pub selected_option: AnswerOption,
    pub time_taken_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

impl AnswerEntry {
    #[must_use]
    pub fn into_record(self) -> AnswerRecord {
        AnswerRecord {
            selected_option: self.selected_option,
            time_taken_seconds: self.time_taken_seconds,
            is_correct: self.is_correct,
        }
    }
}

/// Wire shape for a quiz session, as returned by the remote API.
///
/// Mirrors the domain `QuizSession` so adapters can serialize/deserialize
/// without leaking transport concerns into the domain layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: SessionId,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: u32,
    pub questions: Vec<QuestionRecord>,
    #[serde(default)]
    pub answers: Vec<AnswerEntry>,
}

impl SessionRecord {
    /// Convert the record back into a domain `QuizSession`.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` for invalid questions or inconsistent session
    /// parts (see `QuizSession::from_parts`).
    pub fn into_session(self) -> Result<QuizSession, RecordError> {
        let questions = self
            .questions
            .into_iter()
            .map(QuestionRecord::into_question)
            .collect::<Result<Vec<_>, _>>()?;

        let answers = self
            .answers
            .into_iter()
            .map(|entry| (entry.question_id, entry.into_record()))
            .collect();

        Ok(QuizSession::from_parts(
            self.id,
            self.status,
            self.started_at,
            self.completed_at,
            self.duration_seconds,
            questions,
            answers,
        )?)
    }

    #[must_use]
    pub fn from_session(session: &QuizSession) -> Self {
        let mut answers: Vec<AnswerEntry> = session
            .answers()
            .iter()
            .map(|(question_id, record)| AnswerEntry {
                question_id: *question_id,
                selected_option: record.selected_option,
                time_taken_seconds: record.time_taken_seconds,
                is_correct: record.is_correct,
            })
            .collect();
        // keep record output stable for assertions and logs
        answers.sort_by_key(|entry| entry.question_id);

        Self {
            id: session.id(),
            status: session.status(),
            started_at: session.started_at(),
            completed_at: session.completed_at(),
            duration_seconds: session.duration_seconds(),
            questions: session
                .questions()
                .iter()
                .map(QuestionRecord::from_question)
                .collect(),
            answers,
        }
    }

    /// Answers keyed by question, as the services layer consumes them.
    #[must_use]
    pub fn answer_map(&self) -> HashMap<QuestionId, AnswerRecord> {
        self.answers
            .iter()
            .map(|entry| (entry.question_id, entry.into_record()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;

    fn question_record() -> QuestionRecord {
        QuestionRecord {
            id: QuestionId::random(),
            text: "Which writ compels a public duty?".to_string(),
            option_a: "Certiorari".to_string(),
            option_b: "Mandamus".to_string(),
            option_c: "Prohibition".to_string(),
            option_d: "Habeas corpus".to_string(),
            correct_option: None,
        }
    }

    #[test]
    fn record_roundtrips_through_domain() {
        let record = SessionRecord {
            id: SessionId::random(),
            status: SessionStatus::InProgress,
            started_at: Some(fixed_now()),
            completed_at: None,
            duration_seconds: 900,
            questions: vec![question_record()],
            answers: vec![AnswerEntry {
                question_id: QuestionId::random(),
                selected_option: AnswerOption::B,
                time_taken_seconds: 12,
                is_correct: None,
            }],
        };
        // the stray answer references an unknown question
        assert!(record.clone().into_session().is_err());

        let record = SessionRecord {
            answers: vec![AnswerEntry {
                question_id: record.questions[0].id,
                selected_option: AnswerOption::B,
                time_taken_seconds: 12,
                is_correct: None,
            }],
            ..record
        };
        let session = record.clone().into_session().unwrap();
        let back = SessionRecord::from_session(&session);
        assert_eq!(back, record);
    }

    #[test]
    fn blank_question_text_fails_conversion() {
        let mut bad = question_record();
        bad.text = "  ".to_string();
        let record = SessionRecord {
            id: SessionId::random(),
            status: SessionStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_seconds: 900,
            questions: vec![bad],
            answers: Vec::new(),
        };
        assert!(matches!(
            record.into_session().unwrap_err(),
            RecordError::Question(QuestionError::EmptyText)
        ));
    }

    #[test]
    fn serde_uses_camel_case_names() {
        let record = SessionRecord {
            id: SessionId::random(),
            status: SessionStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_seconds: 600,
            questions: vec![question_record()],
            answers: Vec::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("durationSeconds").is_some());
        assert_eq!(json["status"], "pending");
        assert!(json["questions"][0].get("optionA").is_some());
    }
}
