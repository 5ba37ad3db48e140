use scraper::{ElementRef, Node};
use crate::errors::XsltProbeError;
use crate::models::{DocumentModifier, ModifierPayload, ReportSection, Severity, VulnerabilityCandidate};
use crate::pool::TaskId;
use crate::schema::XmlSchema;
use super::super::container::XmlDocumentContainer;
use super::super::rule::{AnalyzerRule, DomNode};
use super::{candidate, consolidate_by_slot, injectable};

pub const RULE_ID: &str = "xss.element-injection";

/// Generated text that reaches element content is replaced with a custom
/// element named after the value's token. If that element shows up in the
/// output, markup in the slot is not escaped. Text reflected into a comment
/// gets the same element wrapped in `-->`/`<!--` so it has to close the
/// comment first.
#[derive(Debug, Default)]
pub struct ElementInjectionRule;

fn propose(
    xml: &XmlDocumentContainer,
    text: &str,
    in_comment: bool,
    collector: &mut dyn FnMut(DocumentModifier),
) {
    for (token, descriptor) in xml.descriptors_in(text) {
        let marker = format!("{}e", token);
        let payload = if in_comment {
            format!("--><{0}></{0}><!--", marker)
        } else {
            format!("<{0}></{0}>", marker)
        };
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
            .with_payload(ModifierPayload::ElementInjection { marker }),
        );
    }
}

impl AnalyzerRule for ElementInjectionRule {
    fn rule_id(&self) -> &str {
        RULE_ID
    }

    fn check_node(
        &self,
        node: DomNode<'_>,
        xml: &XmlDocumentContainer,
        collector: &mut dyn FnMut(DocumentModifier),
    ) {
        match node.value() {
            Node::Text(text) => propose(xml, text, false, collector),
            Node::Comment(comment) => propose(xml, comment, true, collector),
            _ => {}
        }
    }

    fn element_selectors(&self, _xml: &XmlDocumentContainer) -> Vec<String> {
        Vec::new()
    }

    fn verify_node(
        &self,
        task_id: TaskId,
        node: DomNode<'_>,
        xml: &XmlDocumentContainer,
        collector: &mut dyn FnMut(VulnerabilityCandidate),
    ) {
        let Some(modifier) = xml.modifier() else { return };
        let Some(ModifierPayload::ElementInjection { marker }) = &modifier.payload else { return };
        let Some(injected) = ElementRef::wrap(node) else { return };
        if injected.value().name() != marker.as_str() {
            return;
        }
        let (element, evidence) = match node.parent().and_then(ElementRef::wrap) {
            Some(parent) => (parent.value().name().to_string(), parent.html()),
            None => (marker.clone(), injected.html()),
        };
        collector(candidate(RULE_ID, task_id, modifier, &element, &evidence));
    }

    fn consolidate_results(
        &self,
        schema: Option<&XmlSchema>,
        candidates: &[VulnerabilityCandidate],
    ) -> Result<Vec<ReportSection>, XsltProbeError> {
        let section = consolidate_by_slot(RULE_ID, "Element Injection", Severity::High, schema, candidates)?;
        Ok(vec![section])
    }
}
