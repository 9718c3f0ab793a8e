//! Per-server rule store.
//!
//! A rule is a named attribute a game server advertises (map, player count,
//! region, ...). Each rule carries an optional text payload and an optional
//! integer payload. A handful of keys are reserved for internal bookkeeping
//! and cannot be set, removed or queried through the public API.

use serde::{Deserialize, Serialize};

/// Maximum length of a rule key in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Keys reserved for internal use.
///
/// `"Ping"` is written by the client session to record measured round-trip
/// time; `"IP"` and `"Port"` are address metadata carried in record headers.
pub const RESERVED_KEYS: [&str; 3] = ["IP", "Port", "Ping"];

/// Key under which the client session stores a server's measured ping.
pub const PING_KEY: &str = "Ping";

/// Returns true if `key` is reserved for internal use.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Returns true if `key` could be stored at all (non-empty and short enough).
#[must_use]
pub const fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LEN
}

/// A single advertised attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Case-sensitive rule name
    pub key: String,

    /// Text payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Integer payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int: Option<i32>,
}

impl Rule {
    /// Create a rule
    #[must_use]
    pub fn new(key: impl Into<String>, text: Option<&str>, int: Option<i32>) -> Self {
        Self {
            key: key.into(),
            text: text.map(String::from),
            int,
        }
    }

    /// Returns true if this rule uses a reserved key
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        is_reserved_key(&self.key)
    }

    fn same_value(&self, text: Option<&str>, int: Option<i32>) -> bool {
        self.text.as_deref() == text && self.int == int
    }
}

/// Ordered set of rules, unique by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Create an empty rule set
    #[must_use]
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Set a rule, returning true iff the stored value changed.
    ///
    /// Reserved, empty and oversized keys are rejected as "no change".
    pub fn set_rule(&mut self, key: &str, text: Option<&str>, int: Option<i32>) -> bool {
        if is_reserved_key(key) {
            return false;
        }
        self.set_internal(key, text, int)
    }

    /// Set a rule without the reserved-key check.
    ///
    /// Only the roles themselves call this, to maintain bookkeeping rules
    /// such as [`PING_KEY`].
    pub fn set_internal(&mut self, key: &str, text: Option<&str>, int: Option<i32>) -> bool {
        if !is_valid_key(key) {
            return false;
        }

        match self.rules.iter_mut().find(|rule| rule.key == key) {
            Some(rule) if rule.same_value(text, int) => false,
            Some(rule) => {
                rule.text = text.map(String::from);
                rule.int = int;
                true
            }
            None => {
                self.rules.push(Rule::new(key, text, int));
                true
            }
        }
    }

    /// Remove a rule, returning true iff one was removed.
    pub fn remove_rule(&mut self, key: &str) -> bool {
        if is_reserved_key(key) {
            return false;
        }
        self.rules
            .iter()
            .position(|rule| rule.key == key)
            .map(|index| self.rules.remove(index))
            .is_some()
    }

    /// Look up a rule by key
    #[must_use]
    pub fn find_rule(&self, key: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.key == key)
    }

    /// Returns true if a rule with `key` exists
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.find_rule(key).is_some()
    }

    /// Keep only the rules for which `keep` returns true
    pub fn retain(&mut self, keep: impl FnMut(&Rule) -> bool) {
        self.rules.retain(keep);
    }

    /// Iterate rules in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Remove every rule
    pub fn clear(&mut self) {
        self.rules.clear();
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_rule_reports_change() {
        let mut rules = RuleSet::new();
        assert!(rules.set_rule("map", Some("dust"), None));
        assert!(!rules.set_rule("map", Some("dust"), None));
        assert!(rules.set_rule("map", Some("inferno"), None));
        assert!(rules.set_rule("map", Some("inferno"), Some(3)));
        assert_eq!(rules.len(), 1);

        let rule = rules.find_rule("map").unwrap();
        assert_eq!(rule.text.as_deref(), Some("inferno"));
        assert_eq!(rule.int, Some(3));
    }

    #[test]
    fn test_reserved_keys_are_rejected() {
        let mut rules = RuleSet::new();
        for key in RESERVED_KEYS {
            assert!(!rules.set_rule(key, Some("x"), Some(1)));
        }
        assert!(rules.is_empty());

        assert!(rules.set_internal(PING_KEY, None, Some(40)));
        assert!(!rules.remove_rule(PING_KEY));
        assert!(rules.contains(PING_KEY));
    }

    #[test]
    fn test_invalid_keys_are_rejected() {
        let mut rules = RuleSet::new();
        assert!(!rules.set_rule("", Some("x"), None));
        assert!(!rules.set_rule(&"k".repeat(MAX_KEY_LEN + 1), None, Some(1)));
        assert!(rules.set_rule(&"k".repeat(MAX_KEY_LEN), None, Some(1)));
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let mut rules = RuleSet::new();
        rules.set_rule("Map", Some("a"), None);
        rules.set_rule("map", Some("b"), None);
        assert_eq!(rules.len(), 2);
        // "ping" is not the reserved "Ping"
        assert!(rules.set_rule("ping", None, Some(1)));
    }

    #[test]
    fn test_remove_rule_preserves_order() {
        let mut rules = RuleSet::new();
        rules.set_rule("a", None, Some(1));
        rules.set_rule("b", None, Some(2));
        rules.set_rule("c", None, Some(3));

        assert!(rules.remove_rule("b"));
        assert!(!rules.remove_rule("b"));

        let keys: Vec<&str> = rules.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_rule_set_serialization() {
        let mut rules = RuleSet::new();
        rules.set_rule("region", Some("eu"), None);
        let json = serde_json::to_string(&rules).unwrap();
        assert_eq!(json, r#"[{"key":"region","text":"eu"}]"#);
        let parsed: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rules);
    }
}
