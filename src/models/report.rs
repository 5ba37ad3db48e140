use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::document::{GenerationRuleId, SchemaObjectId};
use super::finding::Severity;

/// One input slot confirmed as an injection point by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFinding {
    pub schema_object: SchemaObjectId,
    /// Element or attribute name of the slot, when the schema is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    pub generation_rule: GenerationRuleId,
    pub elements: Vec<String>,
    pub injected_value: String,
    pub evidence: String,
    pub occurrences: usize,
}

/// A rule's contribution to the report. Rules without findings still
/// contribute a section saying so.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub rule_id: String,
    pub title: String,
    pub severity: Severity,
    pub summary: String,
    pub findings: Vec<ReportFinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub schema_version: u32,
    pub documents_analyzed: usize,
    pub documents_failed: usize,
    pub mutations_proposed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XssReport {
    pub stylesheet: String,
    pub generated_at: DateTime<Utc>,
    pub tool_version: String,
    /// False when at least one rule failed to consolidate its results.
    pub complete: bool,
    pub candidate_count: usize,
    pub statistics: RunStatistics,
    pub sections: Vec<ReportSection>,
}

impl XssReport {
    pub fn finding_count(&self) -> usize {
        self.sections.iter().map(|s| s.findings.len()).sum()
    }
}
