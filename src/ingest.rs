//! Receipt ingestion orchestration.
//!
//! Coordinates one upload end to end: decode → stage → (store ∥ recognize)
//! → extract → categorize. Every external collaborator is best-effort: a
//! failed call only empties its corresponding output field, so
//! [`Ingestor::scan_upload`] always returns a complete [`ScanResponse`].
//!
//! The taxonomy is built once and shared read-only across requests; there
//! is no other state shared between scans.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{Config, ScanConfig};
use crate::keywords::{create_keyword_extractor, KeywordError, KeywordExtractor};
use crate::recognition::{create_recognizer, RecognitionError, Recognizer};
use crate::staging::{upload_file_name, StagedUpload};
use crate::storage::{create_object_store, object_key, ObjectStore, StorageError};
use wedexpense_core::categorize::{categorize_keywords, categorize_text};
use wedexpense_core::extract::{extract_dates, extract_fields, extract_vendor, marked_amounts};
use wedexpense_core::models::{
    CategoryAssignment, ParsedDocument, RecognizedDocument, ScanResponse, UploadedPart,
};
use wedexpense_core::multipart::attachment_or_body;
use wedexpense_core::taxonomy::Taxonomy;

/// The receipt pipeline with its collaborators wired in.
pub struct Ingestor {
    taxonomy: Arc<Taxonomy>,
    store: Arc<dyn ObjectStore>,
    recognizer: Arc<dyn Recognizer>,
    keywords: Arc<dyn KeywordExtractor>,
    settings: ScanConfig,
}

impl Ingestor {
    pub fn new(
        taxonomy: Arc<Taxonomy>,
        store: Arc<dyn ObjectStore>,
        recognizer: Arc<dyn Recognizer>,
        keywords: Arc<dyn KeywordExtractor>,
        settings: ScanConfig,
    ) -> Self {
        Self {
            taxonomy,
            store,
            recognizer,
            keywords,
            settings,
        }
    }

    /// Wire collaborators from the `[storage]`, `[recognition]` and
    /// `[keywords]` sections.
    pub fn from_config(config: &Config) -> Result<Self> {
        let ingestor = Self::new(
            Arc::new(config.taxonomy.build()),
            create_object_store(&config.storage)?,
            create_recognizer(&config.recognition)?,
            create_keyword_extractor(&config.keywords)?,
            config.scan.clone(),
        );
        info!(
            storage = ingestor.store.name(),
            recognition = ingestor.recognizer.name(),
            keywords = ingestor.keywords.name(),
            categories = ingestor.taxonomy.len(),
            "ingestor ready"
        );
        Ok(ingestor)
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Scan a raw request body. Multipart bodies contribute their first file
    /// part; anything else is treated as one anonymous attachment.
    pub async fn scan_upload(&self, content_type: Option<&str>, body: &[u8]) -> ScanResponse {
        self.scan_part(attachment_or_body(content_type, body)).await
    }

    /// Store and recognize one part, then extract fields from its text.
    pub async fn scan_part(&self, part: UploadedPart) -> ScanResponse {
        let now = Utc::now();
        let file_name = upload_file_name(&part, now);
        let key = object_key(&self.settings.key_prefix, &file_name, now);
        debug!(file = %file_name, bytes = part.content.len(), media_type = %part.media_type, "scanning upload");

        let store = self.store.put(&key, &part.content, &part.media_type);
        let (stored, recognized) =
            match StagedUpload::stage(&part, &file_name, self.settings.scratch_dir.as_deref()) {
                Ok(staged) => tokio::join!(store, self.recognizer.recognize(&staged)),
                Err(e) => (store.await, Err(RecognitionError::from(e))),
            };

        let receipt_url = match stored {
            Ok(url) => {
                info!(key = %key, "stored original upload");
                url
            }
            Err(StorageError::Disabled) => String::new(),
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "storing upload failed");
                String::new()
            }
        };

        match self.usable_text(recognized) {
            Some(document) => {
                let fields = extract_fields(&document.text);
                let category = self.categorize(&document.text).await;
                ScanResponse {
                    vendor_name: fields.vendor_name,
                    amount: fields.amount,
                    date: fields.date,
                    category: category.category,
                    receipt_url,
                    confidence: document.confidence_or(self.settings.default_confidence),
                    raw_text: document.text,
                }
            }
            None => ScanResponse {
                vendor_name: String::new(),
                amount: None,
                date: None,
                category: self.taxonomy.default_category().to_string(),
                receipt_url,
                confidence: 0.0,
                raw_text: String::new(),
            },
        }
    }

    /// Recognize a document and report every candidate amount and date
    /// instead of a single best guess. Nothing is stored.
    pub async fn parse_document(&self, content_type: Option<&str>, body: &[u8]) -> ParsedDocument {
        let part = attachment_or_body(content_type, body);
        let file_name = upload_file_name(&part, Utc::now());
        let recognized =
            match StagedUpload::stage(&part, &file_name, self.settings.scratch_dir.as_deref()) {
                Ok(staged) => self.recognizer.recognize(&staged).await,
                Err(e) => Err(RecognitionError::from(e)),
            };

        let text = self
            .usable_text(recognized)
            .map(|document| document.text)
            .unwrap_or_default();
        ParsedDocument {
            vendor_name: extract_vendor(&text),
            amounts: marked_amounts(&text),
            dates: extract_dates(&text),
            category: categorize_text(&self.taxonomy, &text).category,
            text,
        }
    }

    /// Categorize a free-text expense description.
    pub async fn categorize_description(&self, description: &str) -> CategoryAssignment {
        self.categorize(description).await
    }

    /// Keyword-service output is preferred; raw text is the fallback.
    async fn categorize(&self, text: &str) -> CategoryAssignment {
        if text.trim().is_empty() {
            return categorize_text(&self.taxonomy, text);
        }
        match self.keywords.keywords(text).await {
            Ok(keywords) if !keywords.is_empty() => {
                debug!(count = keywords.len(), "categorizing extracted keywords");
                categorize_keywords(&self.taxonomy, &keywords)
            }
            Ok(_) | Err(KeywordError::Disabled) => categorize_text(&self.taxonomy, text),
            Err(e) => {
                warn!(extractor = self.keywords.name(), error = %e, "keyword extraction failed");
                categorize_text(&self.taxonomy, text)
            }
        }
    }

    fn usable_text(
        &self,
        recognized: Result<RecognizedDocument, RecognitionError>,
    ) -> Option<RecognizedDocument> {
        match recognized {
            Ok(document) if document.has_text() => Some(document),
            Ok(_) => {
                info!(recognizer = self.recognizer.name(), "recognition returned no text");
                None
            }
            Err(RecognitionError::Disabled) => None,
            Err(e) => {
                warn!(recognizer = self.recognizer.name(), error = %e, "recognition failed");
                None
            }
        }
    }
}
