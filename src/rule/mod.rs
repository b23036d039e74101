//! Block rule types.

mod kind;

pub use kind::{KeywordPattern, RuleKind, KIND_KEYWORD, KIND_PATTERN, KIND_USER};

use serde::Serialize;
use std::fmt;

use crate::error::Result;

/// Whether a matching rule hides or protects content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Hide matching content
    #[default]
    Blacklist,
    /// Never hide matching content; beats every blacklist match
    Whitelist,
}

impl Category {
    /// Persisted code for blacklist rules.
    pub const BLACKLIST_CODE: i64 = 10;
    /// Persisted code for whitelist rules.
    pub const WHITELIST_CODE: i64 = 11;

    /// Convert from a persisted code.
    ///
    /// Returns `None` for unknown codes.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            Self::BLACKLIST_CODE => Some(Category::Blacklist),
            Self::WHITELIST_CODE => Some(Category::Whitelist),
            _ => None,
        }
    }

    /// Convert to a persisted code.
    pub fn code(self) -> i64 {
        match self {
            Category::Blacklist => Self::BLACKLIST_CODE,
            Category::Whitelist => Self::WHITELIST_CODE,
        }
    }

    /// Parse a category from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "blacklist" | "black" | "block" => Some(Category::Blacklist),
            "whitelist" | "white" | "allow" => Some(Category::Whitelist),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Blacklist => "blacklist",
            Category::Whitelist => "whitelist",
        }
    }

    pub fn is_whitelist(self) -> bool {
        self == Category::Whitelist
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single moderation rule.
///
/// Rules are immutable; editing is remove-then-add (or
/// [`RuleStore::upsert`](crate::RuleStore::upsert)). An `id` of 0 means the
/// rule has not been persisted yet.
///
/// # Examples
/// ```
/// use stashguard::{BlockRule, Category};
///
/// let rule = BlockRule::keyword("spoiler", Category::Blacklist).unwrap();
/// assert!(rule.matches(1, &["no spoiler please"]));
/// assert!(!rule.is_persisted());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRule {
    pub id: i64,
    #[serde(flatten)]
    pub kind: RuleKind,
    pub category: Category,
    /// Display name of a blocked user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BlockRule {
    /// Create an unpersisted rule.
    pub fn new(kind: RuleKind, category: Category) -> Self {
        Self {
            id: 0,
            kind,
            category,
            label: None,
        }
    }

    /// Keyword rule.
    pub fn keyword(text: impl Into<String>, category: Category) -> Result<Self> {
        Ok(Self::new(RuleKind::keyword(text)?, category))
    }

    /// User id rule.
    pub fn user(uid: i64, category: Category) -> Self {
        Self::new(RuleKind::UserId(uid), category)
    }

    /// Regex keyword rule.
    pub fn pattern(pattern: &str, category: Category) -> Result<Self> {
        Ok(Self::new(RuleKind::pattern(pattern)?, category))
    }

    /// Attach a display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Copy of this rule carrying a persisted id.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// Whether this rule's predicate holds for a subject and its texts.
    pub fn matches(&self, subject: i64, texts: &[&str]) -> bool {
        self.kind.matches(subject, texts)
    }

    /// Whether two rules target the same thing, ignoring id, category and label.
    pub fn same_target(&self, other: &BlockRule) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for BlockRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {}", self.id, self.category, self.kind)?;
        if let Some(ref label) = self.label {
            write!(f, " ({})", label)?;
        }
        Ok(())
    }
}
