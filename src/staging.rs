//! Scratch files for in-flight uploads.
//!
//! Recognition backends read the upload from disk (PDF extraction in
//! particular wants a file), so each request copies its part into a named
//! temporary file. The file is unique per request and removed when the
//! [`StagedUpload`] is dropped, whether the scan succeeded or not.

use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

use wedexpense_core::models::UploadedPart;

#[derive(Debug, Error)]
#[error("failed to stage upload: {0}")]
pub struct StageError(#[from] std::io::Error);

/// An upload copied into a request-scoped scratch file.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    file_name: String,
    media_type: String,
}

impl StagedUpload {
    /// Write the part's content into a fresh scratch file under `dir`
    /// (system temp dir when `None`). The file keeps `file_name`'s extension.
    pub fn stage(part: &UploadedPart, file_name: &str, dir: Option<&Path>) -> Result<Self, StageError> {
        let suffix = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        let mut builder = tempfile::Builder::new();
        builder.prefix("wedx-").suffix(&suffix);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(&part.content)?;
        file.flush()?;

        Ok(Self {
            file,
            file_name: file_name.to_string(),
            media_type: part.media_type.clone(),
        })
    }

    /// Location of the scratch file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Whether the upload looks like a PDF, by media type or extension.
    pub fn is_pdf(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("application/pdf")
            || self.file_name.to_ascii_lowercase().ends_with(".pdf")
    }
}

/// The part's declared file name, or `upload_<millis>.<ext>` for anonymous
/// bodies with the extension guessed from the media type.
pub fn upload_file_name(part: &UploadedPart, now: DateTime<Utc>) -> String {
    if let Some(name) = part.file_name.as_deref().filter(|n| !n.trim().is_empty()) {
        return name.to_string();
    }
    let essence = part
        .media_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let ext = match essence.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        _ => "bin",
    };
    format!("upload_{}.{}", now.timestamp_millis(), ext)
}
