use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest learning pattern kept per narration, in characters.
pub const LEARNING_PATTERN_LEN: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Expense,
    Income,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKind::Expense => write!(f, "expense"),
            CategoryKind::Income => write!(f, "income"),
        }
    }
}

impl FromStr for CategoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(CategoryKind::Expense),
            "income" => Ok(CategoryKind::Income),
            other => Err(format!("Unknown category kind: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub kind: CategoryKind,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: CategoryKind) -> Self {
        Self { id: id.into(), name: name.into(), kind }
    }
}

/// Built-in categories seeded into an empty store: `(id, name, kind)`.
pub const DEFAULT_CATEGORIES: &[(&str, &str, CategoryKind)] = &[
    ("food", "Food & Dining", CategoryKind::Expense),
    ("groceries", "Groceries", CategoryKind::Expense),
    ("travel", "Travel & Transport", CategoryKind::Expense),
    ("bills", "Utilities & Bills", CategoryKind::Expense),
    ("rent", "Rent", CategoryKind::Expense),
    ("shopping", "Shopping", CategoryKind::Expense),
    ("health", "Health & Medical", CategoryKind::Expense),
    ("entertainment", "Entertainment", CategoryKind::Expense),
    ("transfer", "Money Transfer", CategoryKind::Expense),
    ("investment", "Investment", CategoryKind::Expense),
    ("other-expense", "Other", CategoryKind::Expense),
    ("salary", "Salary", CategoryKind::Income),
    ("other-income", "Other Income", CategoryKind::Income),
];

pub fn default_categories() -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(id, name, kind)| Category::new(*id, *name, *kind))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategorySource {
    Rule,
    Llm,
    Learning,
    Recurrence,
    Fallback,
}

impl fmt::Display for CategorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CategorySource::Rule => "rule",
            CategorySource::Llm => "llm",
            CategorySource::Learning => "learning",
            CategorySource::Recurrence => "recurrence",
            CategorySource::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// One strategy consulted while categorizing, whether or not it won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAttempt {
    pub source: CategorySource,
    pub category_id: Option<String>,
    pub reason: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub category_id: String,
    pub source: CategorySource,
    pub confidence: f32,
    pub attempts: Vec<CategoryAttempt>,
}

/// A user's narration → category correction, reinforced on every repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub user_id: String,
    pub pattern: String,
    pub category_id: String,
    pub hits: u32,
    pub last_used: DateTime<Utc>,
}

/// Key under which a narration is learned: lowercase, single-spaced, trimmed,
/// at most [`LEARNING_PATTERN_LEN`] characters.
pub fn learning_pattern(narration: &str) -> String {
    narration
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .take(LEARNING_PATTERN_LEN)
        .collect()
}
