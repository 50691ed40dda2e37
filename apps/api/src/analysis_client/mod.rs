//! Analysis client: the single point of entry for calls to the external resume
//! analysis API. Parsing, ATS scoring and suggestion generation all happen there.
//!
//! Handlers reach it through `Arc<dyn ResumeAnalyzer>` in `AppState`.
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::record::{AnalysisRecord, AtsScore, KeywordAnalysis, Suggestions};
use crate::errors::AppError;
use crate::storage::validation::ResumeFile;

const ANALYZE_ENDPOINT: &str = "/resume/analyze";
const SCORE_ENDPOINT: &str = "/resume/score";
const SUGGESTIONS_ENDPOINT: &str = "/resume/suggestions";
const KEYWORDS_ENDPOINT: &str = "/resume/keywords";
const HEALTH_ENDPOINT: &str = "/health";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analysis API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("analysis API returned an unreadable response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The API answered 200 but flagged the analysis itself as failed.
    #[error("Analysis failed: {0}")]
    Rejected(String),

    #[error("Backend service is not available: {0}")]
    Unavailable(String),
}

impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        AppError::Analysis(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: String,
}

/// Body for the text-based auxiliary endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnalysisRequest {
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

#[async_trait]
pub trait ResumeAnalyzer: Send + Sync {
    async fn health(&self) -> Result<HealthStatus, AnalysisError>;

    /// Full analysis of an uploaded resume, optionally against a job description.
    async fn analyze(
        &self,
        resume: &ResumeFile,
        job_description: Option<&str>,
    ) -> Result<AnalysisRecord, AnalysisError>;

    async fn score(&self, request: &TextAnalysisRequest) -> Result<AtsScore, AnalysisError>;

    async fn suggestions(&self, request: &TextAnalysisRequest)
        -> Result<Suggestions, AnalysisError>;

    async fn keywords(&self, request: &TextAnalysisRequest)
        -> Result<KeywordAnalysis, AnalysisError>;
}

#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(base_url: String, timeout_secs: u64) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, base_url })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &TextAnalysisRequest,
    ) -> Result<T, AnalysisError> {
        let url = self.url(endpoint);
        debug!("Calling analysis API: {url}");
        let response = self.client.post(&url).json(request).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl ResumeAnalyzer for AnalysisClient {
    async fn health(&self) -> Result<HealthStatus, AnalysisError> {
        let response = self
            .client
            .get(self.url(HEALTH_ENDPOINT))
            .send()
            .await
            .map_err(|e| AnalysisError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::Unavailable(format!(
                "health check returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn analyze(
        &self,
        resume: &ResumeFile,
        job_description: Option<&str>,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let part = Part::bytes(resume.bytes.to_vec())
            .file_name(resume.file_name.clone())
            .mime_str(&resume.content_type)?;
        let mut form = Form::new().part("resume", part);
        if let Some(jd) = job_description.filter(|jd| !jd.trim().is_empty()) {
            form = form.text("job_description", jd.to_string());
        }

        let url = self.url(ANALYZE_ENDPOINT);
        info!(
            "Submitting {} ({} bytes) for analysis",
            resume.file_name,
            resume.bytes.len()
        );

        let response = self.client.post(&url).multipart(form).send().await?;
        let record: AnalysisRecord = read_json(response).await?;

        if let Some(error) = record.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(AnalysisError::Rejected(error.to_string()));
        }

        debug!(
            "Analysis completed: score={:?} method={:?}",
            record.overall_score(),
            record.analysis_method
        );
        Ok(record)
    }

    async fn score(&self, request: &TextAnalysisRequest) -> Result<AtsScore, AnalysisError> {
        self.post_json(SCORE_ENDPOINT, request).await
    }

    async fn suggestions(
        &self,
        request: &TextAnalysisRequest,
    ) -> Result<Suggestions, AnalysisError> {
        self.post_json(SUGGESTIONS_ENDPOINT, request).await
    }

    async fn keywords(
        &self,
        request: &TextAnalysisRequest,
    ) -> Result<KeywordAnalysis, AnalysisError> {
        self.post_json(KEYWORDS_ENDPOINT, request).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AnalysisError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!("Analysis API returned {status}: {body}");
        return Err(AnalysisError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Prefers the `{"error": "..."}` message the API sends on failure.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                "Resume analysis failed".to_string()
            } else {
                body.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_uses_error_field() {
        assert_eq!(
            error_message(r#"{"error": "Only PDF files are allowed"}"#),
            "Only PDF files are allowed"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message("  "), "Resume analysis failed");
    }

    #[test]
    fn test_url_joins_base_and_endpoint() {
        let client = AnalysisClient::new("http://localhost:5000/api".to_string(), 5).unwrap();
        assert_eq!(
            client.url(ANALYZE_ENDPOINT),
            "http://localhost:5000/api/resume/analyze"
        );
    }

    #[test]
    fn test_rejected_maps_to_analysis_app_error() {
        let err: AppError = AnalysisError::Rejected("timeout".to_string()).into();
        assert!(matches!(err, AppError::Analysis(msg) if msg == "Analysis failed: timeout"));
    }
}
