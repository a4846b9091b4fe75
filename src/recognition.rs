//! Text recognition backends.
//!
//! A [`Recognizer`] turns a staged upload into a [`RecognizedDocument`].
//! Failures are returned as [`RecognitionError`] values; the ingestion
//! orchestrator decides how to degrade.
//!
//! | Provider | Type | Input |
//! |----------|------|-------|
//! | `disabled` | [`DisabledRecognizer`] | none, always fails |
//! | `local` | [`LocalTextRecognizer`] | PDF text layer, UTF-8 text files |
//! | `azure` | [`AzureReadRecognizer`] | anything the `prebuilt-read` model accepts |

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::RecognitionConfig;
use crate::staging::{StageError, StagedUpload};
use wedexpense_core::models::RecognizedDocument;

const AZURE_API_VERSION: &str = "2024-11-30";

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("text recognition is disabled")]
    Disabled,
    #[error(transparent)]
    Staging(#[from] StageError),
    #[error("{0} environment variable not set")]
    MissingKey(String),
    #[error("unsupported media type for local recognition: {0}")]
    Unsupported(String),
    #[error("could not read staged upload: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF text extraction failed: {0}")]
    Pdf(String),
    #[error("recognition request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("recognition service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid recognition response: {0}")]
    InvalidResponse(String),
    #[error("recognition analysis failed: {0}")]
    Failed(String),
    #[error("recognition did not finish after {0} polls")]
    TimedOut(u32),
}

/// Produces text (and optionally a confidence) from an upload.
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, upload: &StagedUpload) -> Result<RecognizedDocument, RecognitionError>;
}

/// Build the recognizer selected by `[recognition].provider`.
pub fn create_recognizer(config: &RecognitionConfig) -> anyhow::Result<Arc<dyn Recognizer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledRecognizer)),
        "local" => Ok(Arc::new(LocalTextRecognizer)),
        "azure" => Ok(Arc::new(AzureReadRecognizer::new(config)?)),
        other => anyhow::bail!("Unknown recognition provider: {}", other),
    }
}

// ============ Disabled ============

pub struct DisabledRecognizer;

#[async_trait]
impl Recognizer for DisabledRecognizer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn recognize(&self, _upload: &StagedUpload) -> Result<RecognizedDocument, RecognitionError> {
        Err(RecognitionError::Disabled)
    }
}

// ============ Local ============

/// Offline recognizer: reads the PDF text layer or plain text files.
///
/// Images are rejected; there is no bundled OCR engine. Local results carry
/// no confidence, so the configured default applies.
pub struct LocalTextRecognizer;

#[async_trait]
impl Recognizer for LocalTextRecognizer {
    fn name(&self) -> &str {
        "local"
    }

    async fn recognize(&self, upload: &StagedUpload) -> Result<RecognizedDocument, RecognitionError> {
        if upload.is_pdf() {
            let path = upload.path().to_path_buf();
            let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
                .await
                .map_err(|e| RecognitionError::Failed(e.to_string()))?
                .map_err(|e| RecognitionError::Pdf(e.to_string()))?;
            return Ok(RecognizedDocument::new(text, None));
        }

        let media_type = upload.media_type().to_ascii_lowercase();
        if media_type.starts_with("text/") {
            let bytes = tokio::fs::read(upload.path()).await?;
            let text = String::from_utf8(bytes)
                .map_err(|_| RecognitionError::Unsupported(format!("{} (not UTF-8)", media_type)))?;
            return Ok(RecognizedDocument::new(text, None));
        }

        Err(RecognitionError::Unsupported(upload.media_type().to_string()))
    }
}

// ============ Azure Document Intelligence ============

/// Azure Document Intelligence `prebuilt-read` model.
///
/// Submits the raw bytes, then polls the `Operation-Location` URL until the
/// analysis succeeds, fails, or `max_polls` is exhausted.
pub struct AzureReadRecognizer {
    endpoint: String,
    api_key_env: String,
    poll_interval: Duration,
    max_polls: u32,
    client: reqwest::Client,
}

impl AzureReadRecognizer {
    pub fn new(config: &RecognitionConfig) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("recognition.endpoint required for azure provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls,
            client,
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/prebuilt-read:analyze?api-version={}",
            self.endpoint, AZURE_API_VERSION
        )
    }
}

#[async_trait]
impl Recognizer for AzureReadRecognizer {
    fn name(&self) -> &str {
        "azure"
    }

    async fn recognize(&self, upload: &StagedUpload) -> Result<RecognizedDocument, RecognitionError> {
        let key = std::env::var(&self.api_key_env)
            .map_err(|_| RecognitionError::MissingKey(self.api_key_env.clone()))?;
        let bytes = tokio::fs::read(upload.path()).await?;

        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &key)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let operation = response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RecognitionError::InvalidResponse("no Operation-Location header".into()))?
            .to_string();

        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            let response = self
                .client
                .get(&operation)
                .header("Ocp-Apim-Subscription-Key", &key)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(status_error(response).await);
            }
            let poll: Value = response.json().await?;

            match poll.get("status").and_then(|s| s.as_str()).unwrap_or("") {
                "succeeded" => return parse_read_result(&poll),
                "failed" => {
                    let message = poll
                        .get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown error");
                    return Err(RecognitionError::Failed(message.to_string()));
                }
                status => debug!(attempt, status, "recognition still running"),
            }
        }

        Err(RecognitionError::TimedOut(self.max_polls))
    }
}

async fn status_error(response: reqwest::Response) -> RecognitionError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RecognitionError::Status {
        status,
        body: body.chars().take(500).collect(),
    }
}

/// Pull text and a 0..100 confidence out of a finished `prebuilt-read` result.
///
/// Text is `analyzeResult.content` when present, otherwise the page lines
/// joined with newlines. Confidence is the mean word confidence.
fn parse_read_result(poll: &Value) -> Result<RecognizedDocument, RecognitionError> {
    let result = poll
        .get("analyzeResult")
        .ok_or_else(|| RecognitionError::InvalidResponse("no analyzeResult".into()))?;
    let pages = result
        .get("pages")
        .and_then(|p| p.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let text = match result.get("content").and_then(|c| c.as_str()) {
        Some(content) if !content.trim().is_empty() => content.to_string(),
        _ => pages
            .iter()
            .filter_map(|page| page.get("lines").and_then(|l| l.as_array()))
            .flatten()
            .filter_map(|line| line.get("content").and_then(|c| c.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
    };

    let scores: Vec<f64> = pages
        .iter()
        .filter_map(|page| page.get("words").and_then(|w| w.as_array()))
        .flatten()
        .filter_map(|word| word.get("confidence").and_then(|c| c.as_f64()))
        .collect();
    let confidence = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64 * 100.0)
    };

    Ok(RecognizedDocument::new(text, confidence))
}
