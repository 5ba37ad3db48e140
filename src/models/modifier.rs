use serde::{Deserialize, Serialize};
use super::document::{GenerationRuleId, SchemaObjectId};

/// Rule-specific cargo attached to a modifier. The closed variants are the
/// ones produced by the shipped analyzer rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModifierPayload {
    /// A custom element named `marker` was injected into element text.
    ElementInjection { marker: String },
    /// An attribute named `data-<marker>` was injected into an attribute value.
    AttributeInjection { marker: String },
    /// A `javascript:` URL carrying `marker` was injected into a URL attribute.
    UrlInjection { marker: String },
    /// Payload of a rule this build does not know about.
    Opaque { data: String },
}

impl ModifierPayload {
    pub fn marker(&self) -> Option<&str> {
        match self {
            Self::ElementInjection { marker }
            | Self::AttributeInjection { marker }
            | Self::UrlInjection { marker } => Some(marker),
            Self::Opaque { .. } => None,
        }
    }
}

/// A proposed replacement of one generated value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentModifier {
    pub schema_object: SchemaObjectId,
    pub generation_rule: GenerationRuleId,
    pub value: String,
    pub original_value: Option<String>,
    /// Analyzer rule that proposed this modifier.
    pub rule_id: Option<String>,
    pub payload: Option<ModifierPayload>,
}

impl DocumentModifier {
    pub fn new(
        schema_object: SchemaObjectId,
        generation_rule: GenerationRuleId,
        value: impl Into<String>,
    ) -> Self {
        Self {
            schema_object,
            generation_rule,
            value: value.into(),
            original_value: None,
            rule_id: None,
            payload: None,
        }
    }

    pub fn with_original_value(mut self, original: impl Into<String>) -> Self {
        self.original_value = Some(original.into());
        self
    }

    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_payload(mut self, payload: ModifierPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Strip everything that does not affect the generated document, so two
    /// proposals with the same effect compare equal.
    pub fn normalize(&self) -> Self {
        Self {
            schema_object: self.schema_object.clone(),
            generation_rule: self.generation_rule,
            value: self.value.clone(),
            original_value: None,
            rule_id: None,
            payload: None,
        }
    }

    pub fn marker(&self) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.marker())
    }
}
