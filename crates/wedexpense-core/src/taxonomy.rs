//! Spending categories and their trigger terms.
//!
//! A [`Taxonomy`] is an ordered list of categories. Order is part of the
//! contract: the categorization engine walks categories in declared order,
//! so the same text always produces the same winner.
//!
//! The built-in table ([`Taxonomy::wedding`]) covers the categories of an
//! Indian wedding budget. Deployments may replace it from configuration at
//! startup; after construction a taxonomy is never mutated and is shared
//! across requests behind an `Arc`.

/// Fallback category for text that matches nothing, or ties.
pub const DEFAULT_CATEGORY: &str = "Miscellaneous";

/// A named category and its lowercase trigger terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub terms: Vec<String>,
}

impl Category {
    /// Terms are lowercased so matching only has to fold the input.
    pub fn new<I, S>(name: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// Immutable, ordered category table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    categories: Vec<Category>,
    default_category: String,
}

const WEDDING_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Venue",
        &["venue", "hall", "banquet", "resort", "hotel", "lawn", "farmhouse", "palace", "mandap"],
    ),
    (
        "Catering",
        &[
            "catering", "food", "caterer", "buffet", "menu", "kitchen", "chef", "meal", "dinner",
            "lunch", "sweet", "mithai",
        ],
    ),
    (
        "Decoration & Flowers",
        &[
            "decoration", "decor", "flower", "floral", "florist", "mandap", "stage", "lighting",
            "rangoli",
        ],
    ),
    (
        "Photography & Videography",
        &[
            "photography", "photo", "photographer", "videography", "video", "videographer",
            "camera", "drone", "album",
        ],
    ),
    (
        "Bridal Clothing",
        &["bridal", "lehenga", "bride", "saree", "sari", "dupatta", "choli"],
    ),
    (
        "Groom Clothing",
        &["groom", "sherwani", "suit", "kurta", "pagri", "safa"],
    ),
    (
        "Jewelry",
        &[
            "jewelry", "jewellery", "gold", "diamond", "necklace", "ring", "bangle", "earring",
            "maang tikka",
        ],
    ),
    (
        "Music & DJ",
        &["music", "dj", "band", "dhol", "sangeet", "singer", "dance"],
    ),
    (
        "Transportation",
        &["transport", "car", "travel", "bus", "flight", "taxi", "cab", "vehicle", "limousine"],
    ),
    (
        "Gifts & Favors",
        &["gift", "favour", "favor", "return gift", "trousseau", "shagun"],
    ),
    (
        "Invitations & Cards",
        &["invitation", "card", "invite", "printing", "stationery"],
    ),
    (
        "Makeup & Beauty",
        &["makeup", "beauty", "salon", "mehndi", "parlour", "parlor", "facial", "spa"],
    ),
    (
        "Pandit & Rituals",
        &["pandit", "priest", "puja", "ritual", "hawan", "pooja", "ceremony"],
    ),
    ("Mehendi Artist", &["mehendi", "mehndi", "henna"]),
    ("Honeymoon", &["honeymoon", "trip", "holiday", "vacation"]),
    (
        "Wedding Planner Fee",
        &["planner", "coordinator", "planning", "management"],
    ),
    ("Miscellaneous", &["misc", "other", "miscellaneous"]),
];

impl Taxonomy {
    /// Build a taxonomy from categories in the order given.
    pub fn new(categories: Vec<Category>, default_category: impl Into<String>) -> Self {
        Self {
            categories,
            default_category: default_category.into(),
        }
    }

    /// The built-in wedding expense taxonomy.
    pub fn wedding() -> Self {
        let categories = WEDDING_CATEGORIES
            .iter()
            .map(|(name, terms)| Category::new(*name, terms.iter()))
            .collect();
        Self::new(categories, DEFAULT_CATEGORY)
    }

    /// Categories in declared order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::wedding()
    }
}
