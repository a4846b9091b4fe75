//! # WedExpense Core
//!
//! Pure receipt-ingestion logic for WedExpense: the multipart upload
//! decoder, the receipt field extractor, the keyword taxonomy, and the
//! categorization engine.
//!
//! This crate contains no tokio, HTTP, filesystem I/O, or other
//! native-only dependencies. Every function is deterministic and never
//! fails: missing information is reported as `None` or an empty
//! collection, and the service layer decides how to surface it.
//!
//! ```text
//! body ──▶ multipart::decode ──▶ UploadedPart
//!                                   │ (OCR, service layer)
//!                                   ▼
//!            extract::extract_fields ◀── text ──▶ categorize::categorize_text
//! ```

pub mod categorize;
pub mod extract;
pub mod models;
pub mod multipart;
pub mod taxonomy;
