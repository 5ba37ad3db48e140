use std::collections::HashSet;
use crate::errors::XsltProbeError;
use super::rule::AnalyzerRule;
use super::rules::{attribute, element, url, AttributeInjectionRule, ElementInjectionRule, UrlInjectionRule};

/// Identifiers of the rules shipped with the tool, in default order.
pub const SHIPPED_RULES: &[&str] = &[element::RULE_ID, attribute::RULE_ID, url::RULE_ID];

/// Builds analyzer rules from configured identifiers.
pub struct RuleRegistry;

impl RuleRegistry {
    pub fn available() -> &'static [&'static str] {
        SHIPPED_RULES
    }

    pub fn create(id: &str) -> Result<Box<dyn AnalyzerRule>, XsltProbeError> {
        match id {
            element::RULE_ID => Ok(Box::new(ElementInjectionRule)),
            attribute::RULE_ID => Ok(Box::new(AttributeInjectionRule)),
            url::RULE_ID => Ok(Box::new(UrlInjectionRule)),
            other => Err(XsltProbeError::UnknownRule(other.to_string())),
        }
    }

    /// Rules for `ids` in the given order. Unknown or repeated ids fail the
    /// whole registration.
    pub fn from_ids(ids: &[String]) -> Result<Vec<Box<dyn AnalyzerRule>>, XsltProbeError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(XsltProbeError::DuplicateRule(id.clone()));
            }
            rules.push(Self::create(id)?);
        }
        Ok(rules)
    }

    pub fn all() -> Vec<Box<dyn AnalyzerRule>> {
        vec![
            Box::new(ElementInjectionRule),
            Box::new(AttributeInjectionRule),
            Box::new(UrlInjectionRule),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_matches_shipped_ids() {
        let all: Vec<String> = RuleRegistry::all().iter().map(|r| r.rule_id().to_string()).collect();
        assert_eq!(all, ids(SHIPPED_RULES));
    }

    #[test]
    fn test_from_ids_preserves_order() {
        let rules = RuleRegistry::from_ids(&ids(&["xss.url-injection", "xss.element-injection"])).unwrap();
        let got: Vec<&str> = rules.iter().map(|r| r.rule_id()).collect();
        assert_eq!(got, vec!["xss.url-injection", "xss.element-injection"]);
    }

    #[test]
    fn test_unknown_id_rejected() {
        let err = RuleRegistry::from_ids(&ids(&["xss.element-injection", "sqli"])).err().unwrap();
        assert!(matches!(err, XsltProbeError::UnknownRule(ref id) if id == "sqli"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = RuleRegistry::from_ids(&ids(&["xss.url-injection", "xss.url-injection"])).err().unwrap();
        assert!(matches!(err, XsltProbeError::DuplicateRule(_)));
    }
}
