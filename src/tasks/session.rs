use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::models::{
    DocumentModifier, GenerationRuleId, RunStatistics, SchemaObjectId, StylesheetRef,
    VulnerabilityCandidate, XssReport,
};

/// Results gathered for one stylesheet across all of its tasks.
pub struct StylesheetSession {
    stylesheet: StylesheetRef,
    candidates: Mutex<Vec<VulnerabilityCandidate>>,
    claimed: Mutex<HashSet<(String, SchemaObjectId, GenerationRuleId)>>,
    report: Mutex<Option<XssReport>>,
    documents_analyzed: AtomicUsize,
    documents_failed: AtomicUsize,
    mutations_proposed: AtomicUsize,
}

impl StylesheetSession {
    pub fn new(stylesheet: StylesheetRef) -> Self {
        Self {
            stylesheet,
            candidates: Mutex::new(Vec::new()),
            claimed: Mutex::new(HashSet::new()),
            report: Mutex::new(None),
            documents_analyzed: AtomicUsize::new(0),
            documents_failed: AtomicUsize::new(0),
            mutations_proposed: AtomicUsize::new(0),
        }
    }

    pub fn stylesheet(&self) -> &StylesheetRef {
        &self.stylesheet
    }

    /// First proposal of a rule for a slot wins; later ones would only
    /// verify the same slot again.
    pub fn claim(&self, modifier: &DocumentModifier) -> bool {
        let key = (
            modifier.rule_id.clone().unwrap_or_default(),
            modifier.schema_object.clone(),
            modifier.generation_rule,
        );
        let claimed = self.claimed.lock().insert(key);
        if claimed {
            self.mutations_proposed.fetch_add(1, Ordering::Relaxed);
        }
        claimed
    }

    pub fn record_candidates(&self, candidates: Vec<VulnerabilityCandidate>) {
        if !candidates.is_empty() {
            self.candidates.lock().extend(candidates);
        }
    }

    pub fn candidates(&self) -> Vec<VulnerabilityCandidate> {
        self.candidates.lock().clone()
    }

    pub fn document_analyzed(&self) {
        self.documents_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn document_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn statistics(&self, schema_version: u32) -> RunStatistics {
        RunStatistics {
            schema_version,
            documents_analyzed: self.documents_analyzed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            mutations_proposed: self.mutations_proposed.load(Ordering::Relaxed),
        }
    }

    pub fn set_report(&self, report: XssReport) {
        *self.report.lock() = Some(report);
    }

    pub fn report(&self) -> Option<XssReport> {
        self.report.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_once_per_rule_and_slot() {
        let session = StylesheetSession::new(StylesheetRef::new("a.xsl"));
        let m = DocumentModifier::new(SchemaObjectId::new("item"), GenerationRuleId(4), "a").with_rule_id("r1");
        assert!(session.claim(&m));
        let same_slot = DocumentModifier::new(SchemaObjectId::new("item"), GenerationRuleId(4), "b").with_rule_id("r1");
        assert!(!session.claim(&same_slot));
        let other_rule = DocumentModifier::new(SchemaObjectId::new("item"), GenerationRuleId(4), "a").with_rule_id("r2");
        assert!(session.claim(&other_rule));
        assert_eq!(session.statistics(1).mutations_proposed, 2);
    }
}
