//! client for the Vertex AI generateContent capability
//!
//! One analysis request per alert, a single attempt each. Failures are
//! reported to the caller as [AnalysisError] and never abort the caller's
//! batch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use thiserror::Error;

/// metadata server url handing out tokens for the ambient service identity
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// config file options for the analysis backend
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct VertexAiSettings {
    pub project_id: String,
    pub region: String,
    pub model: String,
    #[serde_as(as = "DurationSeconds<f64>")]
    pub request_timeout: Duration,
}

impl VertexAiSettings {
    /// url of the generateContent endpoint for the configured model identity
    pub fn endpoint(&self) -> String {
        format!(
            "https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/publishers/google/models/{model}:generateContent",
            region = self.region,
            project = self.project_id,
            model = self.model,
        )
    }
}

/// failure of a single analysis attempt
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to obtain access token from metadata server: {0}")]
    Credentials(#[source] reqwest::Error),
    #[error("request to Vertex AI failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Vertex AI returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("Vertex AI response contains no generated text")]
    NoText,
}

/// capability of turning a prompt into analysis text
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// a single attempt, no retry
    async fn analyze(&self, prompt: &str) -> Result<String, AnalysisError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// [Analyzer] backed by the Vertex AI REST api
///
/// Authenticates with the ambient service account of the environment the
/// process runs in. The model, project and region identity is fixed at
/// construction.
pub struct VertexAiClient {
    client: reqwest::Client,
    endpoint: String,
}

impl VertexAiClient {
    pub fn new(settings: &VertexAiSettings) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self { client, endpoint: settings.endpoint() })
    }

    /// fetches a fresh access token for the ambient service account
    async fn access_token(&self) -> Result<String, AnalysisError> {
        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(AnalysisError::Credentials)?;

        let token: TokenResponse = response
            .error_for_status()
            .map_err(AnalysisError::Credentials)?
            .json()
            .await
            .map_err(AnalysisError::Credentials)?;

        Ok(token.access_token)
    }
}

#[async_trait]
impl Analyzer for VertexAiClient {
    async fn analyze(&self, prompt: &str) -> Result<String, AnalysisError> {
        let token = self.access_token().await?;

        let request = GenerateContentRequest {
            contents: vec![Content { role: "user", parts: vec![Part { text: prompt }] }],
        };

        tracing::debug!(prompt_bytes = prompt.len(), "requesting analysis");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api { status, body });
        }

        let response: GenerateContentResponse = response.json().await?;

        extract_text(response)
    }
}

/// concatenates the generated parts of the first candidate
fn extract_text(response: GenerateContentResponse) -> Result<String, AnalysisError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(AnalysisError::NoText)?;

    let text = candidate
        .content
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect::<String>();

    if text.is_empty() {
        return Err(AnalysisError::NoText);
    }

    Ok(text)
}
