use scraper::ElementRef;
use crate::errors::XsltProbeError;
use crate::models::{DocumentModifier, ModifierPayload, ReportSection, Severity, VulnerabilityCandidate};
use crate::pool::TaskId;
use crate::schema::XmlSchema;
use super::super::container::XmlDocumentContainer;
use super::super::rule::{AnalyzerRule, DomNode};
use super::{candidate, consolidate_by_slot, injectable};

pub const RULE_ID: &str = "xss.attribute-injection";

/// Generated text that lands in an attribute value is replaced with a value
/// that closes the quote and adds a `data-<marker>` attribute.
#[derive(Debug, Default)]
pub struct AttributeInjectionRule;

fn marker_attribute(marker: &str) -> String {
    format!("data-{}", marker)
}

impl AnalyzerRule for AttributeInjectionRule {
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
        for (_, value) in element.attrs() {
            for (token, descriptor) in xml.descriptors_in(value) {
                let marker = format!("{}a", token);
                let payload = format!("{}\" {}=\"1", token, marker_attribute(&marker));
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
                    .with_payload(ModifierPayload::AttributeInjection { marker }),
                );
            }
        }
    }

    fn element_selectors(&self, xml: &XmlDocumentContainer) -> Vec<String> {
        match xml.modifier().and_then(|m| m.payload.as_ref()) {
            Some(ModifierPayload::AttributeInjection { marker }) => {
                vec![format!("[{}]", marker_attribute(marker))]
            }
            _ => Vec::new(),
        }
    }

    fn verify_node(
        &self,
        task_id: TaskId,
        node: DomNode<'_>,
        xml: &XmlDocumentContainer,
        collector: &mut dyn FnMut(VulnerabilityCandidate),
    ) {
        let Some(modifier) = xml.modifier() else { return };
        let Some(ModifierPayload::AttributeInjection { marker }) = &modifier.payload else { return };
        let Some(element) = ElementRef::wrap(node) else { return };
        if element.value().attr(&marker_attribute(marker)).is_none() {
            return;
        }
        let name = element.value().name().to_string();
        collector(candidate(RULE_ID, task_id, modifier, &name, &element.html()));
    }

    fn consolidate_results(
        &self,
        schema: Option<&XmlSchema>,
        candidates: &[VulnerabilityCandidate],
    ) -> Result<Vec<ReportSection>, XsltProbeError> {
        let section = consolidate_by_slot(RULE_ID, "Attribute Injection", Severity::High, schema, candidates)?;
        Ok(vec![section])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::container::tests::{container, descriptor};
    use crate::analysis::rules::testing::{check_all, verify_selected};
    use crate::models::{GenerationRuleId, SchemaObjectId};

    fn verified(marker: &str) -> XmlDocumentContainer {
        let modifier = DocumentModifier::new(SchemaObjectId::new("doc@a"), GenerationRuleId(2), "v")
            .with_rule_id(RULE_ID)
            .with_payload(ModifierPayload::AttributeInjection { marker: marker.to_string() });
        container(vec![], Some(modifier))
    }

    #[test]
    fn test_proposes_quote_breaking_value() {
        let xml = container(vec![descriptor(2, "doc@a", "xpaa000004 sit")], None);
        let found = check_all(&AttributeInjectionRule, "<span class=\"xpaa000004 sit\">x</span>", &xml);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "xpaa000004\" data-xpaa000004a=\"1");
        assert_eq!(found[0].marker(), Some("xpaa000004a"));
    }

    #[test]
    fn test_selector_targets_marker_attribute() {
        let xml = verified("xpzz000002a");
        assert_eq!(AttributeInjectionRule.element_selectors(&xml), vec!["[data-xpzz000002a]"]);
    }

    #[test]
    fn test_verifies_injected_attribute() {
        let xml = verified("xpzz000002a");
        let html = "<div><span class=\"xpzz000002\" data-xpzz000002a=\"1\">x</span><b>y</b></div>";
        let found = verify_selected(&AttributeInjectionRule, html, &xml);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].element, "span");
        assert_eq!(found[0].schema_object.as_str(), "doc@a");
    }

    #[test]
    fn test_escaped_quote_is_not_a_finding() {
        let xml = verified("xpzz000002a");
        let html = "<span class=\"xpzz000002&quot; data-xpzz000002a=&quot;1\">x</span>";
        assert!(verify_selected(&AttributeInjectionRule, html, &xml).is_empty());
    }
}
