//! Keyword-scored expense categorization.
//!
//! Each category's score is the number of its distinct trigger terms that
//! occur as case-insensitive substrings of the input. The category with the
//! strictly highest score wins. When nothing matches, or when two or more
//! categories share the top score, the taxonomy's default category is
//! returned instead of guessing.
//!
//! Categories are visited in the taxonomy's declared order and scoring has
//! no hidden state, so identical input always yields an identical result.
//!
//! ```rust
//! use wedexpense_core::categorize::categorize_text;
//! use wedexpense_core::taxonomy::Taxonomy;
//!
//! let taxonomy = Taxonomy::wedding();
//! let assignment = categorize_text(&taxonomy, "Buffet dinner by Royal Caterers");
//! assert_eq!(assignment.category, "Catering");
//! assert_eq!(assignment.match_score, 3);
//! ```

use crate::models::CategoryAssignment;
use crate::taxonomy::Taxonomy;

/// Categorize a free-text blob (OCR output or an expense description).
pub fn categorize_text(taxonomy: &Taxonomy, text: &str) -> CategoryAssignment {
    let haystack = text.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    let mut tied = false;

    for category in taxonomy.categories() {
        let score = category
            .terms
            .iter()
            .filter(|term| haystack.contains(term.as_str()))
            .count();
        if score == 0 {
            continue;
        }
        match best {
            Some((_, top)) if score < top => {}
            Some((_, top)) if score == top => tied = true,
            _ => {
                best = Some((category.name.as_str(), score));
                tied = false;
            }
        }
    }

    match best {
        Some((name, score)) if !tied => CategoryAssignment {
            category: name.to_string(),
            match_score: score,
        },
        _ => default_assignment(taxonomy),
    }
}

/// Categorize a keyword list returned by a keyword-extraction service.
///
/// Keywords are joined with spaces and scored exactly like raw text.
pub fn categorize_keywords<S: AsRef<str>>(taxonomy: &Taxonomy, keywords: &[S]) -> CategoryAssignment {
    let joined = keywords
        .iter()
        .map(|k| k.as_ref())
        .collect::<Vec<_>>()
        .join(" ");
    categorize_text(taxonomy, &joined)
}

/// The assignment used when there is no evidence for any category.
pub fn default_assignment(taxonomy: &Taxonomy) -> CategoryAssignment {
    CategoryAssignment {
        category: taxonomy.default_category().to_string(),
        match_score: 0,
    }
}
