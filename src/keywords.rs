//! Keyword extraction collaborator.
//!
//! When available, extracted keywords are categorized in preference to the
//! full recognized text. Any failure here falls back to raw-text
//! categorization; the orchestrator never surfaces it to the caller.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::KeywordsConfig;

#[derive(Debug, Error)]
pub enum KeywordError {
    #[error("keyword extraction is disabled")]
    Disabled,
    #[error("keyword request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("keyword service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid keyword response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Salient keywords of `text`, most relevant first.
    async fn keywords(&self, text: &str) -> Result<Vec<String>, KeywordError>;
}

pub fn create_keyword_extractor(config: &KeywordsConfig) -> anyhow::Result<Arc<dyn KeywordExtractor>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledKeywords)),
        "http" => Ok(Arc::new(HttpKeywordExtractor::new(config)?)),
        other => anyhow::bail!("Unknown keywords provider: {}", other),
    }
}

pub struct DisabledKeywords;

#[async_trait]
impl KeywordExtractor for DisabledKeywords {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn keywords(&self, _text: &str) -> Result<Vec<String>, KeywordError> {
        Err(KeywordError::Disabled)
    }
}

/// JSON keyword service: `POST {"text": ...}` to the configured endpoint.
///
/// Accepted response shapes:
/// - `["venue", "hall"]`
/// - `[{"keyword": "venue", "relevance": 0.9}, ...]`
/// - `{"keywords": <either of the above>}`
pub struct HttpKeywordExtractor {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpKeywordExtractor {
    pub fn new(config: &KeywordsConfig) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("keywords.endpoint required for http provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl KeywordExtractor for HttpKeywordExtractor {
    fn name(&self) -> &str {
        "http"
    }

    async fn keywords(&self, text: &str) -> Result<Vec<String>, KeywordError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(KeywordError::Status {
                status,
                body: body.chars().take(500).collect(),
            });
        }

        let body: Value = response.json().await?;
        parse_keywords(&body)
    }
}

fn parse_keywords(body: &Value) -> Result<Vec<String>, KeywordError> {
    let list = match body {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("keywords")
            .and_then(|k| k.as_array())
            .ok_or_else(|| KeywordError::InvalidResponse("missing \"keywords\" array".into()))?,
        _ => return Err(KeywordError::InvalidResponse("expected array or object".into())),
    };

    Ok(list
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("keyword").and_then(|k| k.as_str()),
            _ => None,
        })
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect())
}
