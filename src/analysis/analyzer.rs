use chrono::Utc;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use crate::errors::XsltProbeError;
use crate::models::{
    DocumentModifier, RunStatistics, StylesheetRef, VulnerabilityCandidate, XssReport,
};
use crate::pool::TaskId;
use crate::reporting::tool_version;
use crate::schema::XmlSchema;
use super::container::HtmlDocumentContainer;
use super::rule::AnalyzerRule;
use tracing::{debug, error, warn};

/// Which pass `analyze_document` ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPass {
    Proposal,
    Verification,
}

/// Runs the registered rules over transformation output. Shared by every
/// task of every Director.
pub struct DocumentAnalyzer {
    rules: Vec<Box<dyn AnalyzerRule>>,
}

impl DocumentAnalyzer {
    pub fn new(rules: Vec<Box<dyn AnalyzerRule>>) -> Result<Self, XsltProbeError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.rule_id().to_string()) {
                return Err(XsltProbeError::DuplicateRule(rule.rule_id().to_string()));
            }
        }
        Ok(Self { rules })
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.rule_id()).collect()
    }

    /// Analyze one transformation result. Documents generated without a
    /// rule-attributed modifier get pass 1; the rest are verified by the
    /// rule that proposed their modifier.
    pub fn analyze_document(
        &self,
        task_id: TaskId,
        html: &HtmlDocumentContainer,
        modifier_collector: &mut dyn FnMut(DocumentModifier),
        vulnerability_collector: &mut dyn FnMut(VulnerabilityCandidate),
    ) -> Result<AnalysisPass, XsltProbeError> {
        if html.failed {
            return Err(XsltProbeError::Analysis(format!(
                "Transformation of {} failed, nothing to analyze",
                html.xml.stylesheet()
            )));
        }

        let rule_id = html.xml.modifier().and_then(|m| m.rule_id.as_deref());
        match rule_id {
            None => {
                self.propose(html, modifier_collector);
                Ok(AnalysisPass::Proposal)
            }
            Some(rule_id) => {
                self.verify(task_id, rule_id, html, vulnerability_collector)?;
                Ok(AnalysisPass::Verification)
            }
        }
    }

    fn propose(&self, html: &HtmlDocumentContainer, collector: &mut dyn FnMut(DocumentModifier)) {
        let document = Html::parse_document(&html.html);
        let mut visited = 0usize;
        for node in document.tree.root().descendants() {
            visited += 1;
            for rule in &self.rules {
                rule.check_node(node, &html.xml, collector);
            }
        }
        debug!(nodes = visited, rules = self.rules.len(), "Proposal pass finished");
    }

    fn verify(
        &self,
        task_id: TaskId,
        rule_id: &str,
        html: &HtmlDocumentContainer,
        collector: &mut dyn FnMut(VulnerabilityCandidate),
    ) -> Result<(), XsltProbeError> {
        let matching: Vec<&dyn AnalyzerRule> = self
            .rules
            .iter()
            .filter(|r| r.rule_id() == rule_id)
            .map(|r| r.as_ref())
            .collect();
        let rule = match matching.as_slice() {
            [] => return Err(XsltProbeError::UnknownRule(rule_id.to_string())),
            [rule] => *rule,
            many => return Err(XsltProbeError::AmbiguousRule(rule_id.to_string(), many.len())),
        };

        let document = Html::parse_document(&html.html);
        let selectors = rule.element_selectors(&html.xml);
        if selectors.is_empty() {
            for node in document.tree.root().descendants() {
                rule.verify_node(task_id, node, &html.xml, collector);
            }
            return Ok(());
        }

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for source in &selectors {
            let selector = Selector::parse(source)
                .map_err(|e| XsltProbeError::Selector(format!("{} ({}): {}", source, rule_id, e)))?;
            for node in document.select(&selector) {
                if seen.insert(node.id()) {
                    selected.push(node);
                }
            }
        }
        debug!(rule = rule_id, selectors = selectors.len(), elements = selected.len(), "Verification pass");
        for node in selected {
            rule.verify_node(task_id, *node, &html.xml, collector);
        }
        Ok(())
    }

    /// Build the stylesheet's report. Every rule is consulted in registration
    /// order, also when it has no candidates. A failing rule is skipped and
    /// the report marked incomplete.
    pub fn consolidate_results(
        &self,
        stylesheet: &StylesheetRef,
        schema: Option<&XmlSchema>,
        candidates: &[VulnerabilityCandidate],
        statistics: RunStatistics,
    ) -> XssReport {
        let mut by_rule: HashMap<&str, Vec<VulnerabilityCandidate>> = HashMap::new();
        for c in candidates {
            by_rule.entry(c.rule_id.as_str()).or_default().push(c.clone());
        }
        for orphan in by_rule.keys().filter(|id| self.rules.iter().all(|r| r.rule_id() != **id)) {
            warn!(rule = %orphan, "Candidates reference an unregistered rule");
        }

        let mut sections = Vec::new();
        let mut complete = true;
        for rule in &self.rules {
            let own = by_rule.get(rule.rule_id()).map(Vec::as_slice).unwrap_or(&[]);
            match rule.consolidate_results(schema, own) {
                Ok(mut produced) => sections.append(&mut produced),
                Err(e) => {
                    error!(rule = rule.rule_id(), error = %e, "Rule failed to consolidate results");
                    complete = false;
                }
            }
        }

        XssReport {
            stylesheet: stylesheet.uri(),
            generated_at: Utc::now(),
            tool_version: tool_version(),
            complete,
            candidate_count: candidates.len(),
            statistics,
            sections,
        }
    }
}
