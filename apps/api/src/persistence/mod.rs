//! Resume persistence: the external resume API the editor saves into.
//!
//! `ResumeStore` is the seam: sessions and the auto-save scheduler only see
//! `Arc<dyn ResumeStore>`. `HttpResumeStore` is the production backend.
//! Saves must be idempotent: the scheduler may send the same document twice.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::Document;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Fetches the stored document, `None` if the resume does not exist yet.
    async fn load(&self, resume_id: Uuid) -> Result<Option<Document>, SaveError>;

    async fn save(&self, resume_id: Uuid, document: &Document) -> Result<(), SaveError>;
}

/// Error body shape of the resume API (FastAPI style).
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: Value,
}

/// `ResumeStore` backed by the resume REST API.
#[derive(Clone)]
pub struct HttpResumeStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpResumeStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, SaveError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn resume_url(&self, resume_id: Uuid) -> String {
        format!("{}/resumes/{}", self.base_url, resume_id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ResumeStore for HttpResumeStore {
    async fn load(&self, resume_id: Uuid) -> Result<Option<Document>, SaveError> {
        let response = self
            .authorize(self.client.get(self.resume_url(resume_id)))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let document: Document = response.json().await?;
        debug!("Loaded resume {resume_id} from resume API");
        Ok(Some(document))
    }

    async fn save(&self, resume_id: Uuid, document: &Document) -> Result<(), SaveError> {
        let response = self
            .authorize(self.client.put(self.resume_url(resume_id)))
            .json(document)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        debug!("Saved resume {resume_id} to resume API");
        Ok(())
    }
}

fn api_error(status: StatusCode, body: &str) -> SaveError {
    SaveError::Api {
        status: status.as_u16(),
        message: error_message(status, body),
    }
}

/// Human-readable message for a failed resume API call.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        match parsed.detail {
            Value::String(detail) => return detail,
            Value::Array(items) => {
                let messages: Vec<String> = items
                    .iter()
                    .map(|item| {
                        item.get("msg")
                            .or_else(|| item.get("message"))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| item.to_string())
                    })
                    .collect();
                return messages.join(", ");
            }
            _ => {}
        }
    }

    if status == StatusCode::UNPROCESSABLE_ENTITY {
        return "Please check your input and try again".to_string();
    }
    if status.is_server_error() {
        return "Server error. Please try again later.".to_string();
    }
    format!("Resume API returned {status}")
}
