//! Intent Matcher — selects at most one capability for a query.
//!
//! Matching is a linear scan over an ordered rule table: the first rule
//! whose predicate holds wins. Precedence is registration order, not
//! specificity, so two capabilities whose keywords both appear in a query
//! resolve to whichever was registered first.

use crate::capabilities::{Capability, CapabilityRegistry};

/// Boolean predicate evaluated over lower-cased query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentPredicate {
    /// True when any keyword occurs as a substring. Keywords are stored
    /// lower-cased.
    AnyKeyword(Vec<String>),
    /// Never matches; the capability is only reachable by name.
    Never,
}

impl IntentPredicate {
    pub fn any_of<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        IntentPredicate::AnyKeyword(
            keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        )
    }

    /// `lowered` must already be lower-cased.
    pub fn matches(&self, lowered: &str) -> bool {
        match self {
            IntentPredicate::AnyKeyword(keywords) => {
                keywords.iter().any(|k| lowered.contains(k.as_str()))
            }
            IntentPredicate::Never => false,
        }
    }
}

/// One row of the rule table: a predicate and the capability it selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRule {
    pub predicate: IntentPredicate,
    pub capability: String,
}

/// Ordered `(predicate, capability name)` table built from a registry.
#[derive(Debug, Clone, Default)]
pub struct IntentMatcher {
    rules: Vec<IntentRule>,
}

impl IntentMatcher {
    /// One rule per capability, in registration order.
    pub fn from_registry(registry: &CapabilityRegistry) -> Self {
        let rules = registry
            .list()
            .iter()
            .map(|cap| IntentRule {
                predicate: cap.intent.clone(),
                capability: cap.name.clone(),
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    /// Name of the first capability whose rule holds for `text`.
    pub fn select(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(&lowered))
            .map(|rule| rule.capability.as_str())
    }

    /// Resolve the selected rule back to its capability.
    pub fn match_intent<'r>(
        &self,
        text: &str,
        registry: &'r CapabilityRegistry,
    ) -> Option<&'r Capability> {
        self.select(text).and_then(|name| registry.get(name))
    }
}

/// First capability in `capabilities` whose predicate holds for `text`.
pub fn match_intent<'c>(text: &str, capabilities: &'c [Capability]) -> Option<&'c Capability> {
    let lowered = text.to_lowercase();
    capabilities.iter().find(|c| c.intent.matches(&lowered))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(name: &str, keywords: &[&str]) -> Capability {
        Capability::from_fn(name, "test", |_| async { Ok(String::new()) })
            .with_intent(IntentPredicate::any_of(keywords))
    }

    fn registry(caps: Vec<Capability>) -> CapabilityRegistry {
        CapabilityRegistry::builder()
            .register_all(caps)
            .unwrap()
            .build()
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let pred = IntentPredicate::any_of(["Wallet", "BALANCE"]);
        assert!(pred.matches(&"Show my WALLET".to_lowercase()));
        assert!(pred.matches("balance please"));
        assert!(!pred.matches("price of eth"));
    }

    #[test]
    fn test_never_predicate() {
        assert!(!IntentPredicate::Never.matches("anything at all"));
        assert!(!IntentPredicate::any_of(Vec::<String>::new()).matches("x"));
    }

    #[test]
    fn test_first_registered_wins_on_overlap() {
        let reg = registry(vec![
            cap("alpha", &["shared", "alpha"]),
            cap("beta", &["shared", "beta"]),
        ]);
        let matcher = IntentMatcher::from_registry(&reg);
        assert_eq!(matcher.select("a SHARED keyword"), Some("alpha"));
        assert_eq!(matcher.select("only beta here"), Some("beta"));

        let reversed = registry(vec![
            cap("beta", &["shared", "beta"]),
            cap("alpha", &["shared", "alpha"]),
        ]);
        let matcher = IntentMatcher::from_registry(&reversed);
        assert_eq!(matcher.select("a shared keyword"), Some("beta"));
    }

    #[test]
    fn test_rules_mirror_registration_order() {
        let reg = registry(vec![cap("b", &["x"]), cap("a", &["y"])]);
        let matcher = IntentMatcher::from_registry(&reg);
        let names: Vec<&str> = matcher.rules().iter().map(|r| r.capability.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(matcher.rules()[1].predicate, IntentPredicate::any_of(["y"]));
    }

    #[test]
    fn test_no_match_returns_none() {
        let reg = registry(vec![cap("alpha", &["alpha"])]);
        let matcher = IntentMatcher::from_registry(&reg);
        assert_eq!(matcher.select("hello there"), None);
        assert_eq!(matcher.select(""), None);
        assert!(matcher.match_intent("hello", &reg).is_none());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let reg = registry(vec![
            cap("market", &["market", "price"]),
            cap("wallet", &["wallet"]),
        ]);
        let matcher = IntentMatcher::from_registry(&reg);
        let first = matcher.select("wallet price check").map(str::to_string);
        for _ in 0..50 {
            assert_eq!(matcher.select("wallet price check").map(str::to_string), first);
        }
        assert_eq!(first.as_deref(), Some("market"));
    }

    #[test]
    fn test_free_function_agrees_with_table() {
        let reg = registry(vec![cap("a", &["x"]), cap("b", &["y", "x"])]);
        let matcher = IntentMatcher::from_registry(&reg);
        for text in ["x", "y", "xy", "z"] {
            assert_eq!(
                match_intent(text, reg.list()).map(|c| c.name.as_str()),
                matcher.select(text)
            );
        }
    }
}
