pub mod analyzer;
pub mod container;
pub mod registry;
pub mod rule;
pub mod rules;

pub use analyzer::{AnalysisPass, DocumentAnalyzer};
pub use container::{HtmlDocumentContainer, XmlDocumentContainer};
pub use registry::{RuleRegistry, SHIPPED_RULES};
pub use rule::{AnalyzerRule, DomNode};
