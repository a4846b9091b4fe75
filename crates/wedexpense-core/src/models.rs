//! Core data types that flow through the receipt ingestion pipeline.
//!
//! All records are immutable once built. An [`UploadedPart`] lives for the
//! duration of one request; the extraction records are derived from a
//! [`RecognizedDocument`] and merged by the service layer into a
//! [`ScanResponse`].

use serde::{Serialize, Serializer};
use std::fmt;

/// Media type assumed for parts that do not declare a `Content-Type`.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Confidence reported when the recognition service omits one.
pub const DEFAULT_CONFIDENCE: f64 = 70.0;

/// One decoded section of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    /// Declared field name (`name="..."`), empty when absent.
    pub name: String,
    /// Declared file name (`filename="..."`); only present for file parts.
    pub file_name: Option<String>,
    /// Declared media type, or [`DEFAULT_MEDIA_TYPE`].
    pub media_type: String,
    /// Raw part content, byte-exact.
    pub content: Vec<u8>,
}

impl UploadedPart {
    /// Whether this part carries a file attachment.
    pub fn is_file(&self) -> bool {
        self.file_name.is_some()
    }
}

/// Text produced by the recognition collaborator for one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedDocument {
    pub text: String,
    /// Reported confidence in `0..=100`, if the service provides one.
    pub confidence: Option<f64>,
}

impl RecognizedDocument {
    pub fn new(text: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// Confidence clamped to `0..=100`, falling back to `default` when absent.
    pub fn confidence_or(&self, default: f64) -> f64 {
        self.confidence.unwrap_or(default).clamp(0.0, 100.0)
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Non-negative monetary amount stored in minor units (1/100).
///
/// Displays without a fractional part when it is zero (`850000`), and with
/// exactly two fractional digits otherwise (`1200.50`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    minor_units: u64,
}

impl Amount {
    pub const fn from_minor_units(minor_units: u64) -> Self {
        Self { minor_units }
    }

    pub fn minor_units(&self) -> u64 {
        self.minor_units
    }

    /// Parse localized numeric text such as `8,50,000` or `1,200.5`.
    ///
    /// Grouping commas are stripped. At most two fractional digits are
    /// accepted; anything else (signs, letters, a third fractional digit,
    /// overflow) yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
        let (whole, frac) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let whole: u64 = whole.parse().ok()?;
        let frac: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().ok()? * 10,
            _ => frac.parse().ok()?,
        };
        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac))
            .map(Self::from_minor_units)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.minor_units / 100;
        let frac = self.minor_units % 100;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            write!(f, "{}.{:02}", whole, frac)
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Best-guess structured fields pulled from recognized text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub vendor_name: String,
    pub amount: Option<Amount>,
    /// `YYYY-MM-DD`; not validated against the calendar.
    pub date: Option<String>,
}

/// Winning category for a text blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryAssignment {
    pub category: String,
    /// Distinct trigger terms matched by the winner; zero for the default.
    pub match_score: usize,
}

/// Response of the receipt scan operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResponse {
    pub vendor_name: String,
    pub amount: Option<Amount>,
    pub date: Option<String>,
    pub category: String,
    /// Empty when the object store write failed or was skipped.
    pub receipt_url: String,
    pub confidence: f64,
    pub raw_text: String,
}

/// Response of the document parse operation: every candidate, not a best guess.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedDocument {
    pub text: String,
    pub vendor_name: String,
    pub amounts: Vec<Amount>,
    pub dates: Vec<String>,
    pub category: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_strips_grouping_separators() {
        assert_eq!(Amount::parse("8,50,000").unwrap().to_string(), "850000");
        assert_eq!(Amount::parse("45,000").unwrap().to_string(), "45000");
    }

    #[test]
    fn amount_keeps_two_fraction_digits() {
        assert_eq!(Amount::parse("1,200.5").unwrap().to_string(), "1200.50");
        assert_eq!(Amount::parse("99.99").unwrap().minor_units(), 9999);
        assert_eq!(Amount::parse("100.00").unwrap().to_string(), "100");
    }

    #[test]
    fn amount_rejects_malformed_text() {
        assert!(Amount::parse("").is_none());
        assert!(Amount::parse(",").is_none());
        assert!(Amount::parse("12.345").is_none());
        assert!(Amount::parse("-5").is_none());
        assert!(Amount::parse("99999999999999999999").is_none());
    }

    #[test]
    fn amount_serializes_as_string() {
        let json = serde_json::to_value(Amount::parse("15,000").unwrap()).unwrap();
        assert_eq!(json, serde_json::json!("15000"));
    }

    #[test]
    fn confidence_defaults_and_clamps() {
        assert_eq!(RecognizedDocument::new("x", None).confidence_or(70.0), 70.0);
        assert_eq!(RecognizedDocument::new("x", Some(130.0)).confidence_or(70.0), 100.0);
        assert_eq!(RecognizedDocument::new("x", Some(88.5)).confidence_or(70.0), 88.5);
    }
}
