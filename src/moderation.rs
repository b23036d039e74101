//! Block evaluation over a rule snapshot.
//!
//! A whitelist match always wins: one matching whitelist rule suppresses
//! every matching blacklist rule, wherever the two sit in the rule list.

use crate::rule::{BlockRule, Category};

/// Decide whether content from `subject` carrying `texts` should be hidden.
///
/// Scans every rule at most once. A matching whitelist rule returns `false`
/// immediately; a matching blacklist rule is remembered and the scan goes on,
/// since a later whitelist rule can still override it.
///
/// # Examples
/// ```
/// use stashguard::{should_block, BlockRule, Category};
///
/// let rules = vec![
///     BlockRule::keyword("x", Category::Blacklist).unwrap(),
///     BlockRule::keyword("x", Category::Whitelist).unwrap(),
/// ];
/// assert!(!should_block(&rules, 1, &["xyz"]));
/// ```
pub fn should_block(rules: &[BlockRule], subject: i64, texts: &[&str]) -> bool {
    let mut blocked = false;
    for rule in rules {
        if !rule.matches(subject, texts) {
            continue;
        }
        match rule.category {
            Category::Whitelist => return false,
            Category::Blacklist => blocked = true,
        }
    }
    blocked
}

/// An item that can be moderated: it has an author and some text.
pub trait Moderated {
    /// Author (or other subject) id of the item
    fn subject_id(&self) -> i64;

    /// Texts scanned by keyword rules
    fn texts(&self) -> Vec<&str>;

    /// Whether `rules` hide this item.
    fn is_blocked_by(&self, rules: &[BlockRule]) -> bool {
        should_block(rules, self.subject_id(), &self.texts())
    }
}

/// Drop every item the rules block, keeping the order of the rest.
///
/// Returns the number of items removed.
pub fn retain_visible<T: Moderated>(rules: &[BlockRule], items: &mut Vec<T>) -> usize {
    let before = items.len();
    items.retain(|item| !item.is_blocked_by(rules));
    let removed = before - items.len();
    if removed > 0 {
        log::debug!("Hid {} of {} items", removed, before);
    }
    removed
}
