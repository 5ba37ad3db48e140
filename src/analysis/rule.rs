use scraper::Node;
use crate::errors::XsltProbeError;
use crate::models::{DocumentModifier, ReportSection, VulnerabilityCandidate};
use crate::pool::TaskId;
use crate::schema::XmlSchema;
use super::container::XmlDocumentContainer;

/// A node of the parsed output: element, text, comment or the document
/// itself.
pub type DomNode<'a> = ego_tree::NodeRef<'a, Node>;

/// A detection strategy. Pass 1 inspects every DOM node and proposes
/// document modifications; pass 2 verifies a modification this rule
/// proposed earlier.
///
/// Rules are shared across concurrent analyses and must not keep
/// per-document state.
pub trait AnalyzerRule: Send + Sync {
    /// Unique identifier, recorded in every modifier the rule proposes.
    fn rule_id(&self) -> &str;

    /// Pass 1: inspect one node and emit zero or more modifiers.
    fn check_node(
        &self,
        node: DomNode<'_>,
        xml: &XmlDocumentContainer,
        collector: &mut dyn FnMut(DocumentModifier),
    );

    /// Pass 2: CSS selectors limiting which elements are verified. An empty
    /// list means every node.
    fn element_selectors(&self, xml: &XmlDocumentContainer) -> Vec<String>;

    /// Pass 2: inspect one selected node and emit candidates.
    fn verify_node(
        &self,
        task_id: TaskId,
        node: DomNode<'_>,
        xml: &XmlDocumentContainer,
        collector: &mut dyn FnMut(VulnerabilityCandidate),
    );

    /// Turn this rule's candidates into report sections. Called even when
    /// there are none.
    fn consolidate_results(
        &self,
        schema: Option<&XmlSchema>,
        candidates: &[VulnerabilityCandidate],
    ) -> Result<Vec<ReportSection>, XsltProbeError>;
}
