//! What a block rule matches on.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{Error, Result};

/// Persisted code for keyword rules.
pub const KIND_KEYWORD: i64 = 0;
/// Persisted code for user id rules.
pub const KIND_USER: i64 = 1;
/// Persisted code for regex keyword rules.
pub const KIND_PATTERN: i64 = 2;

/// The match predicate of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RuleKind {
    /// Matches when the keyword is a substring of any scanned text
    Keyword(String),
    /// Matches when the subject id equals this id
    UserId(i64),
    /// Matches when the regex finds a match in any scanned text
    Pattern(KeywordPattern),
}

impl RuleKind {
    /// Keyword kind; rejects blank keywords, which would match every text.
    pub fn keyword(text: impl Into<String>) -> Result<Self> {
        let kind = RuleKind::Keyword(text.into());
        kind.validate()?;
        Ok(kind)
    }

    /// Regex kind; rejects blank or invalid patterns.
    pub fn pattern(pattern: &str) -> Result<Self> {
        KeywordPattern::new(pattern).map(RuleKind::Pattern)
    }

    /// Check a kind built directly from its variants. Storage only accepts
    /// kinds that pass, so every persisted row loads back.
    pub fn validate(&self) -> Result<()> {
        match self {
            RuleKind::Keyword(text) => check_not_blank("keyword", text),
            RuleKind::UserId(_) => Ok(()),
            RuleKind::Pattern(pattern) => check_not_blank("pattern", pattern.as_str()),
        }
    }

    /// Whether this predicate holds for a subject and its texts.
    pub fn matches(&self, subject: i64, texts: &[&str]) -> bool {
        match self {
            RuleKind::Keyword(keyword) => texts.iter().any(|text| text.contains(keyword.as_str())),
            RuleKind::UserId(uid) => *uid == subject,
            RuleKind::Pattern(pattern) => texts.iter().any(|text| pattern.is_match(text)),
        }
    }

    /// Persisted kind code.
    pub fn code(&self) -> i64 {
        match self {
            RuleKind::Keyword(_) => KIND_KEYWORD,
            RuleKind::UserId(_) => KIND_USER,
            RuleKind::Pattern(_) => KIND_PATTERN,
        }
    }

    /// Short name for display.
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Keyword(_) => "keyword",
            RuleKind::UserId(_) => "user",
            RuleKind::Pattern(_) => "pattern",
        }
    }

    /// Keyword text, if this is a keyword rule.
    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            RuleKind::Keyword(keyword) => Some(keyword),
            _ => None,
        }
    }

    /// User id, if this is a user rule.
    pub fn as_user_id(&self) -> Option<i64> {
        match self {
            RuleKind::UserId(uid) => Some(*uid),
            _ => None,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Keyword(keyword) => write!(f, "keyword:{}", keyword),
            RuleKind::UserId(uid) => write!(f, "user:{}", uid),
            RuleKind::Pattern(pattern) => write!(f, "pattern:{}", pattern.as_str()),
        }
    }
}

fn check_not_blank(what: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::InvalidRule(format!("empty {}", what)));
    }
    Ok(())
}

/// Compiled regex keyword. Equality is by source pattern.
#[derive(Debug, Clone)]
pub struct KeywordPattern {
    regex: Regex,
}

impl KeywordPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        check_not_blank("pattern", pattern)?;
        let regex = Regex::new(pattern)
            .map_err(|e| Error::InvalidRule(format!("invalid pattern {:?}: {}", pattern, e)))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Source pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl PartialEq for KeywordPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for KeywordPattern {}

impl Serialize for KeywordPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
