use scraper::ElementRef;
use crate::errors::XsltProbeError;
use crate::models::{DocumentModifier, ModifierPayload, ReportSection, Severity, VulnerabilityCandidate};
use crate::pool::TaskId;
use crate::schema::XmlSchema;
use super::super::container::XmlDocumentContainer;
use super::super::rule::{AnalyzerRule, DomNode};
use super::{candidate, consolidate_by_slot, injectable};

pub const RULE_ID: &str = "xss.url-injection";

const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction"];

/// Generated text that starts a URL attribute is replaced with a
/// `javascript:` URL calling the marker.
#[derive(Debug, Default)]
pub struct UrlInjectionRule;

impl AnalyzerRule for UrlInjectionRule {
    fn rule_id(&self) -> &str {
        RULE_ID
    }

    fn check_node(
        &self,
        node: DomNode<'_>,
        xml: &XmlDocumentContainer,
        collector: &mut dyn FnMut(DocumentModifier),
    ) {
        let Some(element) = node.value().as_element() else { return };
        for name in URL_ATTRIBUTES {
            let Some(value) = element.attr(name) else { continue };
            let value = value.trim_start();
            for (token, descriptor) in xml.descriptors_in(value) {
                if !value.starts_with(token) {
                    continue;
                }
                let marker = format!("{}u", token);
                let payload = format!("javascript:{}()", marker);
                if !injectable(xml, descriptor, &payload) {
                    continue;
                }
                collector(
                    DocumentModifier::new(
                        descriptor.schema_object.clone(),
                        descriptor.generation_rule,
                        payload,
                    )
                    .with_original_value(descriptor.value.clone())
                    .with_rule_id(RULE_ID)
                    .with_payload(ModifierPayload::UrlInjection { marker }),
                );
            }
        }
    }

    fn element_selectors(&self, _xml: &XmlDocumentContainer) -> Vec<String> {
        URL_ATTRIBUTES
            .iter()
            .map(|name| format!("[{}^=\"javascript:\"]", name))
            .collect()
    }

    fn verify_node(
        &self,
        task_id: TaskId,
        node: DomNode<'_>,
        xml: &XmlDocumentContainer,
        collector: &mut dyn FnMut(VulnerabilityCandidate),
    ) {
        let Some(modifier) = xml.modifier() else { return };
        let Some(ModifierPayload::UrlInjection { marker }) = &modifier.payload else { return };
        let Some(element) = ElementRef::wrap(node) else { return };
        let hit = URL_ATTRIBUTES.iter().any(|name| {
            element.value().attr(name).is_some_and(|value| {
                let value = value.trim_start().to_ascii_lowercase();
                value.starts_with("javascript:") && value.contains(marker.as_str())
            })
        });
        if hit {
            let name = element.value().name().to_string();
            collector(candidate(RULE_ID, task_id, modifier, &name, &element.html()));
        }
    }

    fn consolidate_results(
        &self,
        schema: Option<&XmlSchema>,
        candidates: &[VulnerabilityCandidate],
    ) -> Result<Vec<ReportSection>, XsltProbeError> {
        let section = consolidate_by_slot(RULE_ID, "URL Injection", Severity::Medium, schema, candidates)?;
        Ok(vec![section])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::container::tests::{container, descriptor};
    use crate::analysis::rules::testing::{check_all, verify_selected};
    use crate::models::{GenerationRuleId, SchemaObjectId};

    #[test]
    fn test_proposes_for_leading_token_only() {
        let xml = container(
            vec![descriptor(2, "doc@a", "xpaa000001 amet"), descriptor(3, "doc", "xpaa000002 elit")],
            None,
        );
        let html = "<a href=\"xpaa000001 amet\">a</a><a href=\"/page?q=xpaa000002 elit\">b</a>";
        let found = check_all(&UrlInjectionRule, html, &xml);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "javascript:xpaa000001u()");
        assert_eq!(found[0].generation_rule, GenerationRuleId(2));
    }

    #[test]
    fn test_selectors_cover_url_attributes() {
        let xml = container(vec![], None);
        assert_eq!(UrlInjectionRule.element_selectors(&xml).len(), URL_ATTRIBUTES.len());
    }

    #[test]
    fn test_verifies_javascript_url() {
        let modifier = DocumentModifier::new(SchemaObjectId::new("doc@a"), GenerationRuleId(2), "javascript:xpzz000001u()")
            .with_rule_id(RULE_ID)
            .with_payload(ModifierPayload::UrlInjection { marker: "xpzz000001u".to_string() });
        let xml = container(vec![], Some(modifier));
        let html = "<a href=\"javascript:xpzz000001u()\">x</a><img src=\"javascript:other()\">";
        let found = verify_selected(&UrlInjectionRule, html, &xml);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].element, "a");
    }
}
