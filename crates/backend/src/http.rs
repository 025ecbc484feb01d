use std::env;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use quiz_core::model::SessionId;

use crate::api::{AnswerSubmission, BackendError, QuizBackend};
use crate::record::SessionRecord;
use async_trait::async_trait;

/// Connection settings for the remote quiz API.
#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub api_token: String,
}

impl HttpBackendConfig {
    /// Read configuration from `QUIZ_API_BASE_URL` and `QUIZ_API_TOKEN`.
    ///
    /// Returns `None` when the variables are unset, blank, or the base URL
    /// does not parse.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_token = env::var("QUIZ_API_TOKEN").ok()?;
        if api_token.trim().is_empty() {
            return None;
        }
        let base_url = env::var("QUIZ_API_BASE_URL").ok()?;
        Url::parse(&base_url).ok()?;
        Some(Self {
            base_url,
            api_token,
        })
    }
}

/// `QuizBackend` adapter for the remote REST API.
#[derive(Clone)]
pub struct HttpQuizBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpQuizBackend {
    #[must_use]
    pub fn new(config: HttpBackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Build a backend from environment configuration, if present.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        HttpBackendConfig::from_env().map(Self::new)
    }

    fn session_url(&self, id: SessionId, suffix: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if suffix.is_empty() {
            format!("{base}/quiz-sessions/{id}")
        } else {
            format!("{base}/quiz-sessions/{id}/{suffix}")
        }
    }

    async fn read_session(&self, response: Response) -> Result<SessionRecord, BackendError> {
        let record: SessionRecord = response.json().await?;
        Ok(record)
    }
}

/// Error body the API attaches to 4xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    unanswered: Option<u32>,
}

/// Map a non-success response to the backend error taxonomy.
fn classify_status(status: StatusCode, body: Option<ApiErrorBody>) -> BackendError {
    match status {
        StatusCode::NOT_FOUND => BackendError::NotFound,
        StatusCode::CONFLICT => BackendError::Conflict(status.to_string()),
        StatusCode::UNPROCESSABLE_ENTITY => {
            let body = body.unwrap_or(ApiErrorBody {
                code: None,
                unanswered: None,
            });
            let incomplete = body.unanswered.is_some()
                || body.code.as_deref() == Some("incomplete_answers");
            if incomplete {
                BackendError::IncompleteAnswers {
                    unanswered: body.unanswered.unwrap_or(0),
                }
            } else {
                BackendError::Status(status)
            }
        }
        other => BackendError::Status(other),
    }
}

async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = match response.json::<ApiErrorBody>().await {
        Ok(body) => Some(body),
        Err(err) => {
            tracing::debug!(%status, error = %err, "error response carried no readable body");
            None
        }
    };
    Err(classify_status(status, body))
}

#[async_trait]
impl QuizBackend for HttpQuizBackend {
    async fn start_quiz(&self, id: SessionId) -> Result<SessionRecord, BackendError> {
        let response = self
            .client
            .post(self.session_url(id, "start"))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        let response = check(response).await?;
        self.read_session(response).await
    }

    async fn submit_answer(
        &self,
        id: SessionId,
        answer: AnswerSubmission,
    ) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.session_url(id, "answers"))
            .bearer_auth(&self.config.api_token)
            .json(&answer)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn complete_quiz(&self, id: SessionId) -> Result<SessionRecord, BackendError> {
        let response = self
            .client
            .post(self.session_url(id, "complete"))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        let response = check(response).await?;
        self.read_session(response).await
    }

    async fn get_quiz(&self, id: SessionId) -> Result<SessionRecord, BackendError> {
        let response = self
            .client
            .get(self.session_url(id, ""))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        let response = check(response).await?;
        self.read_session(response).await
    }
}
