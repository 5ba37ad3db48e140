use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use std::sync::Arc;
use crate::errors::XsltProbeError;
use crate::models::{
    DocumentModifier, DocumentRequest, ElementRule, GenerationRule, GenerationRuleId,
    StylesheetRef, ValueDescriptor, ValueRule, ValueSlotKind,
};
use crate::schema::{ContentType, SchemaObject, XmlSchema};
use super::value::ValueGenerator;
use super::ValueGeneratorFactory;
use tracing::debug;

/// Turns a schema into a tree of generation rules. Rule ids are assigned in
/// document order starting at 1; id 0 is reserved for schema-level modifiers.
#[derive(Debug, Clone)]
pub struct DocumentRequestBuilder {
    max_depth: usize,
}

impl DocumentRequestBuilder {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn build(&self, stylesheet: &StylesheetRef, schema: &XmlSchema) -> DocumentRequest {
        let mut next_id = GenerationRuleId::SCHEMA.0 + 1;
        let root = self.element_rule(schema, schema.root(), 1, &mut next_id);
        DocumentRequest {
            stylesheet: stylesheet.clone(),
            schema_version: schema.version(),
            root,
            modifier: None,
        }
    }

    fn element_rule(
        &self,
        schema: &XmlSchema,
        object: &SchemaObject,
        depth: usize,
        next_id: &mut u32,
    ) -> ElementRule {
        let id = take_id(next_id);
        let mut children = Vec::new();

        for attribute in &object.attributes {
            if schema.object(attribute).is_some() {
                children.push(GenerationRule::Value(ValueRule {
                    id: take_id(next_id),
                    kind: ValueSlotKind::SetAttribute,
                    schema_object: attribute.clone(),
                    requested: None,
                }));
            }
        }

        let content_slot = match object.content {
            ContentType::Text => Some(ValueSlotKind::AddElementText),
            ContentType::Mixed => Some(ValueSlotKind::AddRawContent),
            ContentType::Empty | ContentType::ElementOnly => None,
        };
        if let Some(kind) = content_slot {
            children.push(GenerationRule::Value(ValueRule {
                id: take_id(next_id),
                kind,
                schema_object: object.id.clone(),
                requested: None,
            }));
        }

        let nests = matches!(object.content, ContentType::ElementOnly | ContentType::Mixed);
        if nests && depth < self.max_depth {
            for child_id in &object.children {
                if let Some(child) = schema.object(child_id).filter(|c| c.is_element()) {
                    children.push(GenerationRule::AddElement(self.element_rule(
                        schema,
                        child,
                        depth + 1,
                        next_id,
                    )));
                }
            }
        } else if nests && !object.children.is_empty() {
            debug!(object = %object.id, depth, "Depth limit reached, children omitted");
        }

        ElementRule {
            id,
            schema_object: object.id.clone(),
            children,
        }
    }
}

fn take_id(next_id: &mut u32) -> GenerationRuleId {
    let id = GenerationRuleId(*next_id);
    *next_id += 1;
    id
}

/// One synthesized input document together with the provenance of every
/// value in it.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub request: DocumentRequest,
    pub xml: String,
    pub descriptors: Vec<ValueDescriptor>,
    pub value_prefix: String,
    pub value_length: usize,
}

impl GeneratedDocument {
    pub fn stylesheet(&self) -> &StylesheetRef {
        &self.request.stylesheet
    }

    pub fn modifier(&self) -> Option<&DocumentModifier> {
        self.request.modifier.as_ref()
    }

    /// Whether the modifier's requested value made it into the document.
    /// A rejected value was replaced by a synthesized one.
    pub fn modifier_applied(&self) -> bool {
        match self.modifier() {
            Some(m) => self
                .descriptors
                .iter()
                .any(|d| d.generation_rule == m.generation_rule && d.requested),
            None => false,
        }
    }
}

/// Writes documents for requests, consuming one `ValueGenerator` each.
pub struct DocumentGenerator {
    values: ValueGeneratorFactory,
}

impl DocumentGenerator {
    pub fn new(values: ValueGeneratorFactory) -> Self {
        Self { values }
    }

    pub fn generate(
        &self,
        schema: Arc<XmlSchema>,
        request: DocumentRequest,
    ) -> Result<GeneratedDocument, XsltProbeError> {
        let mut values = self.values.create(&request.stylesheet, Arc::clone(&schema));
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        write_element(&mut writer, &schema, &request.root, &mut values)?;

        let xml = String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| XsltProbeError::Xml(e.to_string()))?;
        let value_prefix = values.value_prefix().to_string();
        let value_length = values.value_length();
        debug!(
            stylesheet = %request.stylesheet,
            bytes = xml.len(),
            values = values.descriptors().len(),
            "Generated document"
        );

        Ok(GeneratedDocument {
            request,
            xml,
            descriptors: values.into_descriptors(),
            value_prefix,
            value_length,
        })
    }
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    schema: &XmlSchema,
    rule: &ElementRule,
    values: &mut ValueGenerator,
) -> Result<(), XsltProbeError> {
    let object = lookup(schema, rule)?;
    let mut start = BytesStart::new(object.name.as_str());
    let mut content = Vec::new();

    for child in &rule.children {
        match child {
            GenerationRule::Value(slot) if slot.kind == ValueSlotKind::SetAttribute => {
                let attribute = schema.object(&slot.schema_object).ok_or_else(|| {
                    XsltProbeError::Generation(format!("Unknown attribute {}", slot.schema_object))
                })?;
                let value = values.generate_value(slot)?;
                start.push_attribute((attribute.name.as_str(), value.as_str()));
            }
            other => content.push(other),
        }
    }

    if content.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_error)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for child in content {
        match child {
            GenerationRule::AddElement(element) => write_element(writer, schema, element, values)?,
            GenerationRule::Value(slot) => {
                let value = values.generate_value(slot)?;
                let text = match slot.kind {
                    ValueSlotKind::AddRawContent if is_well_formed_fragment(&value) => {
                        BytesText::from_escaped(value.as_str())
                    }
                    _ => BytesText::new(value.as_str()),
                };
                writer.write_event(Event::Text(text)).map_err(xml_error)?;
            }
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(object.name.as_str())))
        .map_err(xml_error)?;
    Ok(())
}

fn lookup<'a>(schema: &'a XmlSchema, rule: &ElementRule) -> Result<&'a SchemaObject, XsltProbeError> {
    schema
        .object(&rule.schema_object)
        .filter(|o| o.is_element())
        .ok_or_else(|| {
            XsltProbeError::Generation(format!(
                "Rule {} targets unknown element {}",
                rule.id, rule.schema_object
            ))
        })
}

/// Whether `fragment` can be embedded as markup without breaking the
/// surrounding document.
fn is_well_formed_fragment(fragment: &str) -> bool {
    let wrapped = format!("<fragment>{}</fragment>", fragment);
    let mut reader = Reader::from_str(&wrapped);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.attributes().any(|a| a.is_err()) {
                    return false;
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                if e.attributes().any(|a| a.is_err()) {
                    return false;
                }
            }
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Ok(Event::Text(t)) => {
                if t.unescape().is_err() {
                    return false;
                }
            }
            Ok(Event::Decl(_)) | Ok(Event::DocType(_)) => return false,
            Ok(Event::Eof) => return depth == 0,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

fn xml_error(e: impl std::fmt::Display) -> XsltProbeError {
    XsltProbeError::Xml(e.to_string())
}
