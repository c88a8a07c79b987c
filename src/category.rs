//! Title categorization.
//!
//! Maps a page title to one topic [`Category`] using an ordered table of
//! keyword rules. Matching is case-insensitive substring containment and the
//! first rule that fires wins, so a title containing keywords from two
//! categories resolves by table order ("LinkedIn Tool" is Professional, not
//! Productivity). Titles matching no rule fall through to [`Category::Others`];
//! the literal title "new tab" is excluded from categorization entirely and
//! yields `None`.
//!
//! [`categorize`] is a pure function of the title alone: total over all input
//! strings, deterministic, and free of side effects. Callers attach the result
//! to a record once at ingestion and never recompute it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic label for a visited page. Closed set; serialized as the exact
/// label string (`"Communication"`, `"Others"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Communication,
    Professional,
    Educational,
    Financial,
    Entertainment,
    Productivity,
    Navigation,
    Others,
}

/// All categories in rule-evaluation order, with `Others` last.
/// Used for stable ordering in breakdowns and reports.
pub const ALL_CATEGORIES: &[Category] = &[
    Category::Communication,
    Category::Professional,
    Category::Educational,
    Category::Financial,
    Category::Entertainment,
    Category::Productivity,
    Category::Navigation,
    Category::Others,
];

/// Lowercased title excluded from categorization (blank browser tabs).
pub const EXCLUDED_TITLE: &str = "new tab";

/// Label used wherever an excluded entry must appear as a string
/// (CSV output, JSON payloads).
pub const UNCLASSIFIED_LABEL: &str = "unclassified";

/// Ordered rule table. Each rule is a category and the lowercase keywords
/// that select it; rules are evaluated top to bottom and the first match
/// wins. `Others` has no keywords — it is the fallthrough.
///
/// The order is load-bearing: overlapping keywords ("bank" vs "tool",
/// "linkedin" vs "jobs") resolve purely by position here.
pub const RULES: &[(Category, &[&str])] = &[
    (
        Category::Communication,
        &[
            "email", "outlook", "whatsapp", "chat", "gmail", "sign in", "login",
        ],
    ),
    (
        Category::Professional,
        &["linkedin", "jobs", "career", "recruitment", "professional"],
    ),
    (
        Category::Educational,
        &[
            "course",
            "colaboratory",
            "learn",
            "education",
            "school",
            "university",
            "college",
            "class",
            "online test",
        ],
    ),
    (
        Category::Financial,
        &["bank", "finance", "gst", "payment", "tax", "economy"],
    ),
    (
        Category::Entertainment,
        &[
            "disney+", "hotstar", "netflix", "youtube", "movie", "tv", "video", "stream",
        ],
    ),
    (
        Category::Productivity,
        &[
            "workday", "onedrive", "dashboard", "planner", "chatgpt", "api", "tool", "manager",
            "software",
        ],
    ),
    (Category::Navigation, &["google maps"]),
];

impl Category {
    /// Returns the category label as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Communication => "Communication",
            Category::Professional => "Professional",
            Category::Educational => "Educational",
            Category::Financial => "Financial",
            Category::Entertainment => "Entertainment",
            Category::Productivity => "Productivity",
            Category::Navigation => "Navigation",
            Category::Others => "Others",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorize a page title.
///
/// Returns `None` only for the excluded title (lowercased equality with
/// [`EXCLUDED_TITLE`], no trimming). Every other title — including the empty
/// string — maps to exactly one [`Category`], falling through to
/// [`Category::Others`] when no keyword matches.
pub fn categorize(title: &str) -> Option<Category> {
    let lower = title.to_lowercase();

    if lower == EXCLUDED_TITLE {
        return None;
    }

    for (category, keywords) in RULES {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return Some(*category);
        }
    }

    Some(Category::Others)
}

/// Label for an optional category: the category label, or
/// [`UNCLASSIFIED_LABEL`] for an excluded entry.
pub fn label(category: Option<Category>) -> &'static str {
    match category {
        Some(c) => c.as_str(),
        None => UNCLASSIFIED_LABEL,
    }
}
