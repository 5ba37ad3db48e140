use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use crate::errors::XsltProbeError;
use crate::generator::GeneratedDocument;
use crate::models::{DocumentModifier, GenerationRuleId, StylesheetRef, ValueDescriptor};
use crate::schema::{SchemaObject, XmlSchema};

/// A generated input document plus the lookups rules need to trace output
/// text back to the slot that produced it.
pub struct XmlDocumentContainer {
    document: GeneratedDocument,
    schema: Arc<XmlSchema>,
    token: Regex,
    by_token: HashMap<String, usize>,
}

impl XmlDocumentContainer {
    pub fn new(document: GeneratedDocument, schema: Arc<XmlSchema>) -> Result<Self, XsltProbeError> {
        let pattern = format!(
            "{}[0-9]{{{},}}",
            regex::escape(&document.value_prefix),
            document.value_length.max(1)
        );
        let token = Regex::new(&pattern).map_err(|e| XsltProbeError::Analysis(e.to_string()))?;

        let mut by_token = HashMap::new();
        for (index, descriptor) in document.descriptors.iter().enumerate() {
            for m in token.find_iter(&descriptor.value) {
                by_token.entry(m.as_str().to_string()).or_insert(index);
            }
        }

        Ok(Self {
            document,
            schema,
            token,
            by_token,
        })
    }

    pub fn document(&self) -> &GeneratedDocument {
        &self.document
    }

    pub fn schema(&self) -> &XmlSchema {
        &self.schema
    }

    pub fn stylesheet(&self) -> &StylesheetRef {
        self.document.stylesheet()
    }

    pub fn modifier(&self) -> Option<&DocumentModifier> {
        self.document.modifier()
    }

    pub fn modifier_applied(&self) -> bool {
        self.document.modifier_applied()
    }

    pub fn descriptors(&self) -> &[ValueDescriptor] {
        &self.document.descriptors
    }

    pub fn descriptor(&self, id: GenerationRuleId) -> Option<&ValueDescriptor> {
        self.document.descriptors.iter().find(|d| d.generation_rule == id)
    }

    pub fn schema_object(&self, descriptor: &ValueDescriptor) -> Option<&SchemaObject> {
        self.schema.object(&descriptor.schema_object)
    }

    /// Generated tokens found in `text`, in order of appearance.
    pub fn tokens_in<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.token.find_iter(text).map(|m| m.as_str()).collect()
    }

    /// Descriptors whose generated token occurs in `text`, each at most once.
    pub fn descriptors_in(&self, text: &str) -> Vec<(&str, &ValueDescriptor)> {
        let mut out: Vec<(&str, &ValueDescriptor)> = Vec::new();
        for m in self.token.find_iter(text) {
            let Some((token, &index)) = self.by_token.get_key_value(m.as_str()) else {
                continue;
            };
            let descriptor = &self.document.descriptors[index];
            if out.iter().all(|(_, d)| d.generation_rule != descriptor.generation_rule) {
                out.push((token.as_str(), descriptor));
            }
        }
        out
    }
}

/// Output of one transformation. A failed container carries no usable
/// HTML and must not be analyzed.
pub struct HtmlDocumentContainer {
    pub html: String,
    pub xml: Arc<XmlDocumentContainer>,
    pub failed: bool,
    pub trace_events: Vec<String>,
}

impl HtmlDocumentContainer {
    pub fn new(html: impl Into<String>, xml: Arc<XmlDocumentContainer>) -> Self {
        Self {
            html: html.into(),
            xml,
            failed: false,
            trace_events: Vec::new(),
        }
    }

    pub fn failed(xml: Arc<XmlDocumentContainer>, reason: impl Into<String>) -> Self {
        Self {
            html: String::new(),
            xml,
            failed: true,
            trace_events: vec![reason.into()],
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{DocumentRequest, ElementRule, SchemaObjectId};
    use crate::schema::{ContentType, SchemaObject};

    pub(crate) fn descriptor(id: u32, object: &str, value: &str) -> ValueDescriptor {
        ValueDescriptor {
            schema_object: SchemaObjectId::new(object),
            generation_rule: GenerationRuleId(id),
            value: value.to_string(),
            requested: false,
        }
    }

    /// Container over a fixed document with prefix `xpaa`, width 6.
    pub(crate) fn container(
        descriptors: Vec<ValueDescriptor>,
        modifier: Option<DocumentModifier>,
    ) -> XmlDocumentContainer {
        let schema = XmlSchema::new(
            SchemaObjectId::new("doc"),
            vec![
                SchemaObject::element("doc", "doc", ContentType::Text).with_attributes(&["doc@a"]),
                SchemaObject::attribute("doc@a", "a", Default::default()),
            ],
        )
        .unwrap();
        let request = DocumentRequest {
            stylesheet: StylesheetRef::new("t.xsl"),
            schema_version: 1,
            root: ElementRule {
                id: GenerationRuleId(1),
                schema_object: SchemaObjectId::new("doc"),
                children: Vec::new(),
            },
            modifier,
        };
        let document = GeneratedDocument {
            request,
            xml: String::new(),
            descriptors,
            value_prefix: "xpaa".to_string(),
            value_length: 6,
        };
        XmlDocumentContainer::new(document, Arc::new(schema)).unwrap()
    }

    #[test]
    fn test_descriptors_in_maps_tokens() {
        let c = container(
            vec![
                descriptor(2, "doc@a", "xpaa000001 lorem"),
                descriptor(3, "doc", "xpaa000002 ipsum"),
            ],
            None,
        );
        let found = c.descriptors_in("see xpaa000002 ipsum and xpaa000001");
        let ids: Vec<u32> = found.iter().map(|(_, d)| d.generation_rule.0).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(found[0].0, "xpaa000002");
    }

    #[test]
    fn test_descriptors_in_requires_exact_token() {
        let c = container(vec![descriptor(2, "doc", "xpaa1000000 lorem")], None);
        assert!(c.descriptors_in("xpaa100000 x").is_empty());
        assert_eq!(c.descriptors_in("xpaa1000000").len(), 1);
    }

    #[test]
    fn test_descriptors_in_ignores_foreign_prefix() {
        let c = container(vec![descriptor(2, "doc", "xpaa000001 lorem")], None);
        assert!(c.descriptors_in("xpab000001 lorem").is_empty());
    }

    #[test]
    fn test_repeated_token_reported_once() {
        let c = container(vec![descriptor(2, "doc", "xpaa000001 lorem")], None);
        assert_eq!(c.descriptors_in("xpaa000001 xpaa000001").len(), 1);
    }
}
