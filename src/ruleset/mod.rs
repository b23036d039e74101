//! Immutable snapshots of the block rule collection.

use serde::{Serialize, Serializer};
use std::sync::Arc;

use crate::moderation;
use crate::rule::{BlockRule, Category};

/// Immutable, cheaply clonable snapshot of all block rules.
///
/// Order carries no meaning for evaluation; it is insertion order only so
/// listings are stable. Mutations build a new snapshot and leave existing
/// ones untouched, so readers never see a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Arc<[BlockRule]>,
}

impl RuleSet {
    /// Create a snapshot from a list of rules.
    pub fn new(rules: Vec<BlockRule>) -> Self {
        Self {
            rules: Arc::from(rules),
        }
    }

    /// Create an empty snapshot.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Get the number of rules in this set.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if this rule set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BlockRule> {
        self.rules.iter()
    }

    pub fn as_slice(&self) -> &[BlockRule] {
        &self.rules
    }

    /// Look up a rule by id.
    pub fn get(&self, id: i64) -> Option<&BlockRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Whether a rule equal to `rule` is present.
    pub fn contains(&self, rule: &BlockRule) -> bool {
        self.rules.iter().any(|r| r == rule)
    }

    /// Whether a plain keyword rule with exactly this text exists.
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.kind.as_keyword() == Some(keyword))
    }

    /// First user rule for `uid`.
    pub fn find_user(&self, uid: i64) -> Option<&BlockRule> {
        self.rules
            .iter()
            .find(|rule| rule.kind.as_user_id() == Some(uid))
    }

    /// Rules of one category.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &BlockRule> {
        self.rules.iter().filter(move |rule| rule.category == category)
    }

    /// Evaluate this snapshot; see [`moderation::should_block`].
    pub fn should_block(&self, subject: i64, texts: &[&str]) -> bool {
        moderation::should_block(self, subject, texts)
    }

    /// New snapshot with `rule` appended.
    pub(crate) fn with_rule(&self, rule: BlockRule) -> Self {
        let mut rules = self.rules.to_vec();
        rules.push(rule);
        Self::new(rules)
    }

    /// New snapshot with every rule of this id removed.
    pub(crate) fn without_id(&self, id: i64) -> Self {
        Self::new(
            self.rules
                .iter()
                .filter(|rule| rule.id != id)
                .cloned()
                .collect(),
        )
    }

    /// New snapshot where the entry with the same id, or failing that the
    /// same target, is replaced by `rule`; appended when neither exists.
    pub(crate) fn with_replaced(&self, rule: BlockRule) -> Self {
        let mut rules = self.rules.to_vec();
        let index = rules
            .iter()
            .position(|r| r.id == rule.id)
            .or_else(|| rules.iter().position(|r| r.same_target(&rule)));
        match index {
            Some(index) => rules[index] = rule,
            None => rules.push(rule),
        }
        Self::new(rules)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<BlockRule>> for RuleSet {
    fn from(rules: Vec<BlockRule>) -> Self {
        Self::new(rules)
    }
}

impl FromIterator<BlockRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = BlockRule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a BlockRule;
    type IntoIter = std::slice::Iter<'a, BlockRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl std::ops::Deref for RuleSet {
    type Target = [BlockRule];

    fn deref(&self) -> &[BlockRule] {
        &self.rules
    }
}

impl Serialize for RuleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rules.serialize(serializer)
    }
}
