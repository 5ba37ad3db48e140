pub mod attribute;
pub mod element;
pub mod url;

pub use attribute::AttributeInjectionRule;
pub use element::ElementInjectionRule;
pub use url::UrlInjectionRule;

use std::collections::HashSet;
use crate::errors::XsltProbeError;
use crate::generator::validate_value;
use crate::models::{
    DocumentModifier, GenerationRuleId, ReportFinding, ReportSection, Severity, ValueDescriptor,
    VulnerabilityCandidate,
};
use crate::pool::TaskId;
use crate::schema::XmlSchema;
use super::container::XmlDocumentContainer;

const EVIDENCE_LIMIT: usize = 240;

/// Whether `payload` can be requested for the slot that produced `descriptor`.
pub(crate) fn injectable(xml: &XmlDocumentContainer, descriptor: &ValueDescriptor, payload: &str) -> bool {
    if descriptor.generation_rule == GenerationRuleId::SCHEMA {
        return false;
    }
    match xml.schema_object(descriptor) {
        Some(object) => {
            object.constraints.accepts_free_text()
                && validate_value(&object.constraints, payload).is_ok()
        }
        None => false,
    }
}

pub(crate) fn excerpt(html: &str) -> String {
    if html.chars().count() <= EVIDENCE_LIMIT {
        return html.to_string();
    }
    let mut cut: String = html.chars().take(EVIDENCE_LIMIT).collect();
    cut.push_str("...");
    cut
}

pub(crate) fn candidate(
    rule_id: &str,
    task_id: TaskId,
    modifier: &DocumentModifier,
    element: &str,
    evidence: &str,
) -> VulnerabilityCandidate {
    VulnerabilityCandidate {
        rule_id: rule_id.to_string(),
        task_id,
        schema_object: modifier.schema_object.clone(),
        generation_rule: modifier.generation_rule,
        injected_value: modifier.value.clone(),
        element: element.to_string(),
        evidence: excerpt(evidence),
    }
}

/// One finding per input slot, in order of first confirmation.
pub(crate) fn consolidate_by_slot(
    rule_id: &str,
    title: &str,
    severity: Severity,
    schema: Option<&XmlSchema>,
    candidates: &[VulnerabilityCandidate],
) -> Result<ReportSection, XsltProbeError> {
    if let Some(foreign) = candidates.iter().find(|c| c.rule_id != rule_id) {
        return Err(XsltProbeError::Analysis(format!(
            "{} received a candidate from {}",
            rule_id, foreign.rule_id
        )));
    }

    let mut findings: Vec<ReportFinding> = Vec::new();
    let mut documents = HashSet::new();
    for c in candidates {
        documents.insert(c.task_id);
        let existing = findings
            .iter_mut()
            .find(|f| f.schema_object == c.schema_object && f.generation_rule == c.generation_rule);
        match existing {
            Some(finding) => {
                finding.occurrences += 1;
                if !finding.elements.contains(&c.element) {
                    finding.elements.push(c.element.clone());
                }
            }
            None => findings.push(ReportFinding {
                schema_object: c.schema_object.clone(),
                object_name: schema
                    .and_then(|s| s.object(&c.schema_object))
                    .map(|o| o.name.clone()),
                generation_rule: c.generation_rule,
                elements: vec![c.element.clone()],
                injected_value: c.injected_value.clone(),
                evidence: c.evidence.clone(),
                occurrences: 1,
            }),
        }
    }

    let summary = if findings.is_empty() {
        format!("No {} found.", title.to_lowercase())
    } else {
        format!(
            "{} injectable input slot(s) confirmed in {} verified document(s).",
            findings.len(),
            documents.len()
        )
    };

    Ok(ReportSection {
        rule_id: rule_id.to_string(),
        title: title.to_string(),
        severity,
        summary,
        findings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SchemaObjectId;
    use uuid::Uuid;

    fn cand(rule: &str, task: Uuid, object: &str, id: u32, element: &str) -> VulnerabilityCandidate {
        VulnerabilityCandidate {
            rule_id: rule.to_string(),
            task_id: task,
            schema_object: SchemaObjectId::new(object),
            generation_rule: GenerationRuleId(id),
            injected_value: "<x>".to_string(),
            element: element.to_string(),
            evidence: "<p><x></x></p>".to_string(),
        }
    }

    #[test]
    fn test_groups_by_slot() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let candidates = vec![
            cand("r", t1, "item", 4, "p"),
            cand("r", t2, "item", 4, "div"),
            cand("r", t2, "title", 2, "h1"),
            cand("r", t2, "item", 4, "p"),
        ];
        let section = consolidate_by_slot("r", "Things", Severity::High, None, &candidates).unwrap();
        assert_eq!(section.findings.len(), 2);
        assert_eq!(section.findings[0].occurrences, 3);
        assert_eq!(section.findings[0].elements, vec!["p", "div"]);
        assert_eq!(section.findings[1].schema_object.as_str(), "title");
        assert!(section.summary.starts_with("2 injectable"));
    }

    #[test]
    fn test_empty_section_still_produced() {
        let section = consolidate_by_slot("r", "Element Injection", Severity::High, None, &[]).unwrap();
        assert!(section.findings.is_empty());
        assert_eq!(section.summary, "No element injection found.");
    }

    #[test]
    fn test_foreign_candidate_rejected() {
        let err = consolidate_by_slot("r", "T", Severity::Low, None, &[cand("other", Uuid::new_v4(), "a", 1, "p")]);
        assert!(err.is_err());
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "a".repeat(500);
        let cut = excerpt(&long);
        assert_eq!(cut.len(), EVIDENCE_LIMIT + 3);
        assert_eq!(excerpt("short"), "short");
    }
}
