//! # WedExpense receipt ingestion
//!
//! Turns an uploaded receipt or vendor quote into a structured expense
//! draft: vendor name, amount, date, spending category, a link to the
//! stored original, and the recognized text.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!  upload ──────▶ │  multipart   │  (wedexpense-core)
//!                 └──────┬───────┘
//!                        ▼
//!                 ┌──────────────┐   put    ┌──────────────┐
//!                 │   Ingestor   │────────▶ │ ObjectStore  │
//!                 │              │ recognize┌──────────────┐
//!                 │              │────────▶ │  Recognizer  │
//!                 └──────┬───────┘          └──────────────┘
//!                        ▼
//!             extract + categorize  (wedexpense-core)
//! ```
//!
//! The pure pipeline stages (multipart decoding, field extraction,
//! categorization, the taxonomy) live in the `wedexpense-core` crate and do
//! no I/O. This crate wires them to external collaborators and exposes them
//! through the `wedx` CLI and an HTTP API.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`ingest`] | Scan orchestration with graceful degradation |
//! | [`storage`] | Object store for original uploads (S3, disabled) |
//! | [`recognition`] | Text recognition backends (Azure, local, disabled) |
//! | [`keywords`] | Keyword extraction collaborator |
//! | [`staging`] | Request-scoped scratch files |
//! | [`server`] | HTTP API |

pub mod config;
pub mod ingest;
pub mod keywords;
pub mod recognition;
pub mod server;
pub mod staging;
pub mod storage;
