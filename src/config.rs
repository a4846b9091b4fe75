//! TOML configuration parsing and validation.
//!
//! Every section is optional; a missing section falls back to defaults that
//! disable all external collaborators, so `wedx` can run offline.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8740"
//! max_upload_bytes = 10485760
//!
//! [scan]
//! key_prefix = "receipts/"
//! default_confidence = 70.0
//!
//! [storage]
//! provider = "s3"
//! bucket = "wedexpense-receipts"
//! region = "ap-south-1"
//!
//! [recognition]
//! provider = "azure"
//! endpoint = "https://my-resource.cognitiveservices.azure.com"
//!
//! [keywords]
//! provider = "http"
//! endpoint = "http://127.0.0.1:9100/keywords"
//!
//! [[taxonomy.categories]]
//! name = "Venue"
//! terms = ["venue", "hall", "banquet"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use wedexpense_core::taxonomy::{Category, Taxonomy, DEFAULT_CATEGORY};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub keywords: KeywordsConfig,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8740".to_string()
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// Directory for scratch files; the system temp dir when unset.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_confidence")]
    pub default_confidence: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            key_prefix: default_key_prefix(),
            default_confidence: default_confidence(),
        }
    }
}

fn default_key_prefix() -> String {
    "receipts/".to_string()
}
fn default_confidence() -> f64 {
    wedexpense_core::models::DEFAULT_CONFIDENCE
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Base URL used to build returned receipt links, e.g. a CDN.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_storage_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            bucket: None,
            region: default_region(),
            endpoint_url: None,
            public_base_url: None,
            timeout_secs: default_storage_timeout_secs(),
        }
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_storage_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecognitionConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the service key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_recognition_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            endpoint: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_recognition_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

fn default_api_key_env() -> String {
    "AZURE_OCR_KEY".to_string()
}
fn default_recognition_timeout_secs() -> u64 {
    120
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_max_polls() -> u32 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeywordsConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_keywords_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            endpoint: None,
            timeout_secs: default_keywords_timeout_secs(),
        }
    }
}

fn default_keywords_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct TaxonomyConfig {
    #[serde(default = "default_category")]
    pub default_category: String,
    /// Replaces the built-in wedding taxonomy when non-empty.
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            default_category: default_category(),
            categories: Vec::new(),
        }
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    pub name: String,
    pub terms: Vec<String>,
}

impl TaxonomyConfig {
    /// Build the immutable taxonomy shared by every request.
    pub fn build(&self) -> Taxonomy {
        if self.categories.is_empty() {
            let builtin = Taxonomy::wedding();
            return Taxonomy::new(builtin.categories().to_vec(), self.default_category.clone());
        }
        let categories = self
            .categories
            .iter()
            .map(|c| Category::new(c.name.clone(), c.terms.iter()))
            .collect();
        Taxonomy::new(categories, self.default_category.clone())
    }
}

impl Config {
    /// All-defaults configuration: no storage, recognition or keyword
    /// service, built-in taxonomy.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.server.max_upload_bytes == 0 {
        bail!("server.max_upload_bytes must be > 0");
    }

    if !(0.0..=100.0).contains(&config.scan.default_confidence) {
        bail!("scan.default_confidence must be in [0.0, 100.0]");
    }

    match config.storage.provider.as_str() {
        "disabled" => {}
        "s3" => {
            if config.storage.bucket.as_deref().unwrap_or("").is_empty() {
                bail!("storage.bucket must be set when provider is 's3'");
            }
        }
        other => bail!(
            "Unknown storage provider: '{}'. Must be disabled or s3.",
            other
        ),
    }

    match config.recognition.provider.as_str() {
        "disabled" | "local" => {}
        "azure" => {
            if config.recognition.endpoint.is_none() {
                bail!("recognition.endpoint must be set when provider is 'azure'");
            }
            if config.recognition.max_polls == 0 {
                bail!("recognition.max_polls must be > 0");
            }
        }
        other => bail!(
            "Unknown recognition provider: '{}'. Must be disabled, local, or azure.",
            other
        ),
    }

    match config.keywords.provider.as_str() {
        "disabled" => {}
        "http" => {
            if config.keywords.endpoint.is_none() {
                bail!("keywords.endpoint must be set when provider is 'http'");
            }
        }
        other => bail!(
            "Unknown keywords provider: '{}'. Must be disabled or http.",
            other
        ),
    }

    if config.taxonomy.default_category.trim().is_empty() {
        bail!("taxonomy.default_category must not be empty");
    }
    let mut seen = HashSet::new();
    for category in &config.taxonomy.categories {
        if category.name.trim().is_empty() {
            bail!("taxonomy category names must not be empty");
        }
        if !seen.insert(category.name.as_str()) {
            bail!("duplicate taxonomy category: '{}'", category.name);
        }
        if category.terms.iter().all(|t| t.trim().is_empty()) {
            bail!("taxonomy category '{}' has no terms", category.name);
        }
    }

    Ok(())
}
