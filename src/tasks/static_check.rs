use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use crate::errors::XsltProbeError;
use crate::models::{DocumentModifier, GenerationRuleId};
use crate::schema::{SchemaObjectKind, XmlSchema};

const EXPRESSION_ATTRIBUTES: &[&[u8]] = &[b"test", b"select", b"match", b"use"];

/// What a stylesheet reveals without running it.
#[derive(Debug, Default)]
pub struct StaticScan {
    /// Literal values the stylesheet compares schema objects against.
    pub modifiers: Vec<DocumentModifier>,
    /// Instructions with `disable-output-escaping="yes"`.
    pub unescaped_outputs: usize,
}

fn comparison() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(@?)([A-Za-z_][A-Za-z0-9_.\-]*)\s*!?=\s*(?:'([^']*)'|"([^"]*)")"#)
            .unwrap_or_else(|e| panic!("invalid comparison pattern: {}", e))
    })
}

/// Scan XSLT source for `name = 'literal'` comparisons on schema objects.
pub fn scan_stylesheet(source: &str, schema: &XmlSchema) -> Result<StaticScan, XsltProbeError> {
    let mut reader = Reader::from_str(source);
    let mut scan = StaticScan::default();
    let mut seen = HashSet::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| XsltProbeError::Xml(format!("position {}: {}", reader.buffer_position(), e)))?;
        let element = match event {
            Event::Start(e) | Event::Empty(e) => e,
            Event::Eof => break,
            _ => continue,
        };
        for attribute in element.attributes() {
            let attribute = attribute.map_err(|e| XsltProbeError::Xml(e.to_string()))?;
            let key = attribute.key.local_name();
            let value = attribute
                .unescape_value()
                .map_err(|e| XsltProbeError::Xml(e.to_string()))?;

            if key.as_ref() == b"disable-output-escaping" && &*value == "yes" {
                scan.unescaped_outputs += 1;
                continue;
            }
            if !EXPRESSION_ATTRIBUTES.contains(&key.as_ref()) {
                continue;
            }

            for caps in comparison().captures_iter(&value) {
                let kind = if caps.get(1).is_some_and(|m| !m.as_str().is_empty()) {
                    SchemaObjectKind::Attribute
                } else {
                    SchemaObjectKind::Element
                };
                let Some(name) = caps.get(2).map(|m| m.as_str()) else { continue };
                let Some(literal) = caps.get(3).or_else(|| caps.get(4)).map(|m| m.as_str()) else {
                    continue;
                };
                for object in schema.find_by_name(name, kind) {
                    let modifier = DocumentModifier::new(object.id.clone(), GenerationRuleId::SCHEMA, literal);
                    if seen.insert(modifier.clone()) {
                        scan.modifiers.push(modifier);
                    }
                }
            }
        }
    }
    Ok(scan)
}
