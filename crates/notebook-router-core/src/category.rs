//! Routing categories and the intent-classification prompt.
//!
//! Every question is routed to exactly one [`Category`]. The set is closed:
//! nine product lines, one competitor bucket, one general-knowledge bucket,
//! and [`Category::Unknown`], which only exists so that the registry can
//! alias it to the general notebook. The classifier never returns it.
//!
//! # Reply Matching
//!
//! The model is asked to answer with a bare label. [`match_reply`] accepts:
//!
//! 1. an exact label (after trimming and removing line breaks), else
//! 2. the first label, in declaration order, that occurs anywhere in the
//!    reply (so `"The answer is EXEOL_OPA because..."` → `EXEOL_OPA`).
//!
//! Anything else is left to the caller, which defaults to
//! [`Category::General`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An intent label that selects a knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    ExeolOpa,
    ExeolGta,
    #[serde(rename = "EXEOL_CLEAN_4E")]
    ExeolClean4e,
    ExeolSeptFirst,
    #[serde(rename = "EXEOL_SEPT_E2")]
    ExeolSeptE2,
    ExeolRinsematic,
    ExeolSurfOptimal,
    #[serde(rename = "EXEOL_SURF_30")]
    ExeolSurf30,
    ExeolWipeOptimals,
    Competitor,
    General,
    Unknown,
}

impl Category {
    /// All categories in declaration order, `UNKNOWN` last.
    pub const ALL: [Category; 12] = [
        Category::ExeolOpa,
        Category::ExeolGta,
        Category::ExeolClean4e,
        Category::ExeolSeptFirst,
        Category::ExeolSeptE2,
        Category::ExeolRinsematic,
        Category::ExeolSurfOptimal,
        Category::ExeolSurf30,
        Category::ExeolWipeOptimals,
        Category::Competitor,
        Category::General,
        Category::Unknown,
    ];

    /// Categories the classifier may return, in tie-break order.
    pub const ROUTABLE: [Category; 11] = [
        Category::ExeolOpa,
        Category::ExeolGta,
        Category::ExeolClean4e,
        Category::ExeolSeptFirst,
        Category::ExeolSeptE2,
        Category::ExeolRinsematic,
        Category::ExeolSurfOptimal,
        Category::ExeolSurf30,
        Category::ExeolWipeOptimals,
        Category::Competitor,
        Category::General,
    ];

    /// The wire label, e.g. `"EXEOL_CLEAN_4E"`.
    pub fn label(self) -> &'static str {
        match self {
            Category::ExeolOpa => "EXEOL_OPA",
            Category::ExeolGta => "EXEOL_GTA",
            Category::ExeolClean4e => "EXEOL_CLEAN_4E",
            Category::ExeolSeptFirst => "EXEOL_SEPT_FIRST",
            Category::ExeolSeptE2 => "EXEOL_SEPT_E2",
            Category::ExeolRinsematic => "EXEOL_RINSEMATIC",
            Category::ExeolSurfOptimal => "EXEOL_SURF_OPTIMAL",
            Category::ExeolSurf30 => "EXEOL_SURF_30",
            Category::ExeolWipeOptimals => "EXEOL_WIPE_OPTIMALS",
            Category::Competitor => "COMPETITOR",
            Category::General => "GENERAL",
            Category::Unknown => "UNKNOWN",
        }
    }

    /// The category whose configured notebook this category uses.
    ///
    /// `UNKNOWN` has no slot of its own and reads the `GENERAL` binding.
    pub fn binding_source(self) -> Category {
        match self {
            Category::Unknown => Category::General,
            other => other,
        }
    }

    /// Environment variable holding this category's notebook id(s).
    pub fn env_key(self) -> String {
        format!("NOTEBOOK_ID_{}", self.binding_source().label())
    }

    /// Marketed product name for product-line categories.
    pub fn product_name(self) -> Option<&'static str> {
        match self {
            Category::ExeolOpa => Some("Exeol OPA"),
            Category::ExeolGta => Some("Exeol GTA"),
            Category::ExeolClean4e => Some("Exeol Clean 4E"),
            Category::ExeolSeptFirst => Some("Exeol Sept First"),
            Category::ExeolSeptE2 => Some("Exeol Sept E2"),
            Category::ExeolRinsematic => Some("Exeol Rinsematic"),
            Category::ExeolSurfOptimal => Some("Exeol Surf Optimal"),
            Category::ExeolSurf30 => Some("Exeol Surf 30"),
            Category::ExeolWipeOptimals => Some("Exeol Wipe Optimals"),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string is not a category label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category label: '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

impl FromStr for Category {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.label() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// How a model reply was turned into a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The reply was exactly a label.
    Exact,
    /// A label was found inside a longer reply.
    Fuzzy,
}

/// Normalize a raw model reply: trim and drop line breaks.
pub fn normalize_reply(reply: &str) -> String {
    reply.trim().replace(['\n', '\r'], "")
}

/// Map a model reply to a routable category.
///
/// Returns `None` when neither an exact nor a substring match exists.
pub fn match_reply(reply: &str) -> Option<(Category, MatchKind)> {
    let text = normalize_reply(reply);

    if let Some(c) = Category::ROUTABLE.iter().find(|c| c.label() == text) {
        return Some((*c, MatchKind::Exact));
    }

    Category::ROUTABLE
        .iter()
        .find(|c| text.contains(c.label()))
        .map(|c| (*c, MatchKind::Fuzzy))
}

/// Build the one-shot classification prompt for `question`.
pub fn classification_prompt(question: &str) -> String {
    let mut products = String::new();
    for (i, category) in Category::ROUTABLE.iter().enumerate() {
        if let Some(name) = category.product_name() {
            let note = match category {
                Category::ExeolOpa => " (Disinfectant, high level)",
                Category::ExeolClean4e => " (Enzymatic cleaner)",
                _ => "",
            };
            products.push_str(&format!(
                "{}. {}: Related to \"{}\"{}.\n",
                i + 1,
                category.label(),
                name,
                note
            ));
        }
    }

    format!(
        r#"You are an expert intent classifier for a healthcare infection control product system.
Your task is to classify the USER QUERY into exactly one of the following categories (KEYS).

PRODUCT CATEGORIES:
{products}
COMPETITOR CATEGORY:
10. COMPETITOR: Use this if the query mentions ANY competitor brand or product.
    Known brands: Anios, Bbraun, Hexanios, Surfanios, Gymp, Pfizer, Johnson & Johnson, 3M, Cidex, etc.
    Also use this if the query asks for "comparison", "market", "alternatives" without specifying a specific Exeol product as the primary focus.

GENERAL CATEGORY:
11. GENERAL: General infection control knowledge, guidelines, procedures, regulations, generic medical terms (e.g., "how to wash hands", "sterilization process").

RULES:
- Output ONLY the Key (e.g., "EXEOL_OPA"). Do not explain.
- If uncertain, default to "GENERAL".

USER QUERY: "{question}"
CATEGORY KEY:
"#
    )
}
