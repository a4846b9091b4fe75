//! Heuristic receipt field extraction.
//!
//! Pulls a vendor name, a bottom-line amount, and a date out of raw OCR
//! text. Extraction is pattern based and never fails; a field that cannot
//! be found is returned as absent so the user can fill it in manually.
//!
//! # Amount strategies
//!
//! Amounts are resolved by [`AMOUNT_STRATEGIES`], evaluated in order with
//! first-success-wins semantics:
//!
//! | # | Strategy | Picks |
//! |---|----------|-------|
//! | 1 | `total_line` | number after `total` / `grand total` / `net amount` / `payable` on the same line |
//! | 2 | `largest_marked` | largest amount prefixed with `₹`, `Rs`, `Rs.` or `INR` |
//! | 3 | `largest_grouped` | largest bare number (optionally comma-grouped) above 100 |
//!
//! A total line therefore beats a larger unmarked number elsewhere on the
//! receipt, and a marked amount beats any bare number.
//!
//! # Dates
//!
//! The first `d/m/y` (also `d-m-y`, `d.m.y`) match is taken in
//! day-month-year order, zero-padded, with two-digit years read as 20xx.
//! A date must not touch other digits on either side.
//! Components are not checked against the calendar: `31/04/2024` is
//! returned as `2024-04-31`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Amount, ExtractionResult};

/// A single amount heuristic.
pub type AmountStrategy = fn(&str) -> Option<Amount>;

/// Amount heuristics in priority order.
pub const AMOUNT_STRATEGIES: &[(&str, AmountStrategy)] = &[
    ("total_line", amount_from_total_line),
    ("largest_marked", largest_marked_amount),
    ("largest_grouped", largest_grouped_number),
];

/// Bare numbers at or below this value are treated as quantities or page
/// counts, not prices.
const BARE_NUMBER_FLOOR: Amount = Amount::from_minor_units(100 * 100);

static TOTAL_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:grand\s*total|total|net\s*amount|payable)[^\n]*?(?:₹|\b(?:rs\.?|inr))?\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)",
    )
    .expect("total line pattern is valid")
});

static MARKED_AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:₹|\b(?:rs\.?|inr))\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)")
        .expect("marked amount pattern is valid")
});

static GROUPED_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([0-9]{1,3}(?:,[0-9]{2,3})*(?:\.[0-9]{1,2})?)\b")
        .expect("grouped number pattern is valid")
});

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{1,2})[/.\-]([0-9]{1,2})[/.\-]([0-9]{4}|[0-9]{2})(?:[^0-9]|$)")
        .expect("date pattern is valid")
});

/// Extract vendor, amount and date from recognized text.
pub fn extract_fields(text: &str) -> ExtractionResult {
    ExtractionResult {
        vendor_name: extract_vendor(text),
        amount: extract_amount(text),
        date: extract_date(text),
    }
}

/// First non-blank line, trimmed. Empty when the text has no content.
pub fn extract_vendor(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Run [`AMOUNT_STRATEGIES`] in order and return the first hit.
pub fn extract_amount(text: &str) -> Option<Amount> {
    AMOUNT_STRATEGIES
        .iter()
        .find_map(|(_, strategy)| strategy(text))
}

/// Amount on the first total-like line.
pub fn amount_from_total_line(text: &str) -> Option<Amount> {
    TOTAL_LINE_RE
        .captures_iter(text)
        .find_map(|caps| Amount::parse(&caps[1]))
}

/// Largest currency-marked amount anywhere in the text.
pub fn largest_marked_amount(text: &str) -> Option<Amount> {
    marked_amounts(text).into_iter().max()
}

/// Largest bare number above the plausibility floor.
pub fn largest_grouped_number(text: &str) -> Option<Amount> {
    GROUPED_NUMBER_RE
        .captures_iter(text)
        .filter_map(|caps| Amount::parse(&caps[1]))
        .filter(|a| *a > BARE_NUMBER_FLOOR)
        .max()
}

/// Every currency-marked amount, in order of appearance.
pub fn marked_amounts(text: &str) -> Vec<Amount> {
    MARKED_AMOUNT_RE
        .captures_iter(text)
        .filter_map(|caps| Amount::parse(&caps[1]))
        .collect()
}

/// First date in the text as `YYYY-MM-DD`.
pub fn extract_date(text: &str) -> Option<String> {
    dates_in(text).next()
}

/// Every date in the text as `YYYY-MM-DD`, in order of appearance.
pub fn extract_dates(text: &str) -> Vec<String> {
    dates_in(text).collect()
}

/// Both guards of [`DATE_RE`] consume a character, so each search resumes
/// at the end of the previous year to let the next date reuse the separator.
fn dates_in(text: &str) -> impl Iterator<Item = String> + '_ {
    let mut at = 0;
    std::iter::from_fn(move || {
        let caps = DATE_RE.captures_at(text, at)?;
        let year = caps.get(3)?;
        at = year.end();
        Some(normalize_date(&caps[1], &caps[2], year.as_str()))
    })
}

fn normalize_date(day: &str, month: &str, year: &str) -> String {
    let year = if year.len() == 2 {
        format!("20{}", year)
    } else {
        year.to_string()
    };
    format!("{}-{:0>2}-{:0>2}", year, month, day)
}
