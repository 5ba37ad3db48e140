use serde::{Deserialize, Serialize};
use super::modifier::DocumentModifier;
use super::stylesheet::StylesheetRef;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaObjectId(String);

impl SchemaObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SchemaObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationRuleId(pub u32);

impl GenerationRuleId {
    /// Used by schema-level modifiers that do not target a generated slot.
    pub const SCHEMA: GenerationRuleId = GenerationRuleId(0);
}

impl std::fmt::Display for GenerationRuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Externally proposed value for one slot, validated before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedValue {
    pub value: String,
    /// Analyzer rule that proposed the value.
    pub rule_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueSlotKind {
    SetAttribute,
    AddElementText,
    AddRawContent,
}

impl std::fmt::Display for ValueSlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetAttribute => write!(f, "set-attribute"),
            Self::AddElementText => write!(f, "add-element-text"),
            Self::AddRawContent => write!(f, "add-raw-content"),
        }
    }
}

/// One fillable value slot of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRule {
    pub id: GenerationRuleId,
    pub kind: ValueSlotKind,
    pub schema_object: SchemaObjectId,
    pub requested: Option<RequestedValue>,
}

/// Structural rule: emit one element, then its attributes and content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRule {
    pub id: GenerationRuleId,
    pub schema_object: SchemaObjectId,
    pub children: Vec<GenerationRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum GenerationRule {
    AddElement(ElementRule),
    Value(ValueRule),
}

/// Instructions for synthesizing one XML input document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub stylesheet: StylesheetRef,
    pub schema_version: u32,
    pub root: ElementRule,
    /// Mutation this request replays, if any.
    pub modifier: Option<DocumentModifier>,
}

impl DocumentRequest {
    /// All value slots in document order.
    pub fn value_rules(&self) -> Vec<&ValueRule> {
        let mut out = Vec::new();
        collect_value_rules(&self.root, &mut out);
        out
    }

    pub fn value_rule(&self, id: GenerationRuleId) -> Option<&ValueRule> {
        self.value_rules().into_iter().find(|r| r.id == id)
    }

    /// Build the follow-up request that replays `modifier` as a requested
    /// value. Returns `None` when the modifier names no slot of this request.
    pub fn with_modifier(&self, modifier: DocumentModifier) -> Option<DocumentRequest> {
        let mut request = self.clone();
        // A replay starts from clean slots.
        clear_requested(&mut request.root);
        let slot = find_value_rule_mut(&mut request.root, modifier.generation_rule)?;
        if slot.schema_object != modifier.schema_object {
            return None;
        }
        slot.requested = Some(RequestedValue {
            value: modifier.value.clone(),
            rule_id: modifier.rule_id.clone(),
        });
        request.modifier = Some(modifier);
        Some(request)
    }
}

fn collect_value_rules<'a>(element: &'a ElementRule, out: &mut Vec<&'a ValueRule>) {
    for child in &element.children {
        match child {
            GenerationRule::AddElement(e) => collect_value_rules(e, out),
            GenerationRule::Value(v) => out.push(v),
        }
    }
}

fn find_value_rule_mut(element: &mut ElementRule, id: GenerationRuleId) -> Option<&mut ValueRule> {
    for child in element.children.iter_mut() {
        match child {
            GenerationRule::AddElement(e) => {
                if let Some(found) = find_value_rule_mut(e, id) {
                    return Some(found);
                }
            }
            GenerationRule::Value(v) if v.id == id => return Some(v),
            GenerationRule::Value(_) => {}
        }
    }
    None
}

fn clear_requested(element: &mut ElementRule) {
    for child in element.children.iter_mut() {
        match child {
            GenerationRule::AddElement(e) => clear_requested(e),
            GenerationRule::Value(v) => v.requested = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(id: u32, kind: ValueSlotKind, object: &str) -> GenerationRule {
        GenerationRule::Value(ValueRule {
            id: GenerationRuleId(id),
            kind,
            schema_object: SchemaObjectId::new(object),
            requested: None,
        })
    }

    fn request() -> DocumentRequest {
        DocumentRequest {
            stylesheet: StylesheetRef::new("a.xsl"),
            schema_version: 1,
            root: ElementRule {
                id: GenerationRuleId(1),
                schema_object: SchemaObjectId::new("catalog"),
                children: vec![
                    value(2, ValueSlotKind::SetAttribute, "catalog@name"),
                    GenerationRule::AddElement(ElementRule {
                        id: GenerationRuleId(3),
                        schema_object: SchemaObjectId::new("item"),
                        children: vec![value(4, ValueSlotKind::AddElementText, "item")],
                    }),
                ],
            },
            modifier: None,
        }
    }

    #[test]
    fn test_value_rules_in_document_order() {
        let req = request();
        let ids: Vec<u32> = req.value_rules().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn test_with_modifier_sets_requested_value() {
        let req = request();
        let modifier = DocumentModifier::new(SchemaObjectId::new("item"), GenerationRuleId(4), "<b>")
            .with_rule_id("xss.element-injection");
        let follow_up = req.with_modifier(modifier.clone()).unwrap();
        let slot = follow_up.value_rule(GenerationRuleId(4)).unwrap();
        let requested = slot.requested.as_ref().unwrap();
        assert_eq!(requested.value, "<b>");
        assert_eq!(requested.rule_id.as_deref(), Some("xss.element-injection"));
        assert_eq!(follow_up.modifier, Some(modifier));
        assert!(req.modifier.is_none());
    }

    #[test]
    fn test_with_modifier_rejects_mismatched_object() {
        let req = request();
        let modifier = DocumentModifier::new(SchemaObjectId::new("other"), GenerationRuleId(4), "x");
        assert!(req.with_modifier(modifier).is_none());
    }

    #[test]
    fn test_with_modifier_rejects_unknown_slot() {
        let req = request();
        let modifier = DocumentModifier::new(SchemaObjectId::new("item"), GenerationRuleId(99), "x");
        assert!(req.with_modifier(modifier).is_none());
    }

    #[test]
    fn test_with_modifier_clears_previous_requests() {
        let req = request();
        let first = req
            .with_modifier(DocumentModifier::new(SchemaObjectId::new("catalog@name"), GenerationRuleId(2), "a"))
            .unwrap();
        let second = first
            .with_modifier(DocumentModifier::new(SchemaObjectId::new("item"), GenerationRuleId(4), "b"))
            .unwrap();
        assert!(second.value_rule(GenerationRuleId(2)).unwrap().requested.is_none());
        assert!(second.value_rule(GenerationRuleId(4)).unwrap().requested.is_some());
    }
}
