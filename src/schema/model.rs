use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use crate::errors::XsltProbeError;
use crate::models::SchemaObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    Integer,
    #[default]
    String,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::String => write!(f, "string"),
        }
    }
}

/// Known values of a slot. A fixed set is exhaustive; an advisory set only
/// biases generation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscreteValues {
    pub values: Vec<String>,
    #[serde(default)]
    pub fixed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValueConstraints {
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discrete_values: Option<DiscreteValues>,
}

impl ValueConstraints {
    pub fn string() -> Self {
        Self::default()
    }

    pub fn integer(min_value: Option<i64>, max_value: Option<i64>) -> Self {
        Self {
            data_type: DataType::Integer,
            min_value,
            max_value,
            ..Default::default()
        }
    }

    pub fn boolean() -> Self {
        Self {
            data_type: DataType::Boolean,
            ..Default::default()
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_discrete_values(mut self, values: &[&str], fixed: bool) -> Self {
        self.discrete_values = Some(DiscreteValues {
            values: values.iter().map(|v| v.to_string()).collect(),
            fixed,
        });
        self
    }

    /// The exhaustive value set, if one is declared.
    pub fn fixed_values(&self) -> Option<&[String]> {
        self.discrete_values
            .as_ref()
            .filter(|d| d.fixed)
            .map(|d| d.values.as_slice())
    }

    /// Whether arbitrary text can be placed in this slot.
    pub fn accepts_free_text(&self) -> bool {
        self.data_type == DataType::String && self.fixed_values().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    #[default]
    Empty,
    ElementOnly,
    Text,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaObjectKind {
    Element,
    Attribute,
}

/// One addressable object of the schema: an element or an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaObject {
    pub id: SchemaObjectId,
    pub name: String,
    pub kind: SchemaObjectKind,
    #[serde(default)]
    pub content: ContentType,
    #[serde(default)]
    pub constraints: ValueConstraints,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<SchemaObjectId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SchemaObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_id: Option<String>,
}

impl SchemaObject {
    pub fn element(id: &str, name: &str, content: ContentType) -> Self {
        Self {
            id: SchemaObjectId::new(id),
            name: name.to_string(),
            kind: SchemaObjectKind::Element,
            content,
            constraints: ValueConstraints::default(),
            attributes: Vec::new(),
            children: Vec::new(),
            requested_id: None,
        }
    }

    pub fn attribute(id: &str, name: &str, constraints: ValueConstraints) -> Self {
        Self {
            id: SchemaObjectId::new(id),
            name: name.to_string(),
            kind: SchemaObjectKind::Attribute,
            content: ContentType::Empty,
            constraints,
            attributes: Vec::new(),
            children: Vec::new(),
            requested_id: None,
        }
    }

    pub fn with_constraints(mut self, constraints: ValueConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_attributes(mut self, ids: &[&str]) -> Self {
        self.attributes = ids.iter().map(|id| SchemaObjectId::new(*id)).collect();
        self
    }

    pub fn with_children(mut self, ids: &[&str]) -> Self {
        self.children = ids.iter().map(|id| SchemaObjectId::new(*id)).collect();
        self
    }

    pub fn is_element(&self) -> bool {
        self.kind == SchemaObjectKind::Element
    }
}

/// On-disk form of a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub version: u32,
    pub root: SchemaObjectId,
    pub objects: Vec<SchemaObject>,
}

/// Structural model of the XML input a stylesheet accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SchemaDocument", into = "SchemaDocument")]
pub struct XmlSchema {
    version: u32,
    root: SchemaObjectId,
    order: Vec<SchemaObjectId>,
    objects: HashMap<SchemaObjectId, SchemaObject>,
}

impl XmlSchema {
    pub fn new(root: SchemaObjectId, objects: Vec<SchemaObject>) -> Result<Self, XsltProbeError> {
        let mut order = Vec::with_capacity(objects.len());
        let mut by_id = HashMap::with_capacity(objects.len());
        for object in objects {
            if by_id.contains_key(&object.id) {
                return Err(XsltProbeError::Schema(format!("Duplicate schema object id: {}", object.id)));
            }
            order.push(object.id.clone());
            by_id.insert(object.id.clone(), object);
        }

        let schema = Self { version: 1, root, order, objects: by_id };
        schema.check_references()?;
        Ok(schema)
    }

    fn check_references(&self) -> Result<(), XsltProbeError> {
        match self.objects.get(&self.root) {
            Some(root) if root.is_element() => {}
            Some(_) => {
                return Err(XsltProbeError::Schema(format!("Root object {} is not an element", self.root)));
            }
            None => {
                return Err(XsltProbeError::Schema(format!("Root object {} is not defined", self.root)));
            }
        }

        for object in self.objects.values() {
            for attr in &object.attributes {
                match self.objects.get(attr) {
                    Some(a) if !a.is_element() => {}
                    _ => {
                        return Err(XsltProbeError::Schema(format!(
                            "Element {} references unknown attribute {}",
                            object.id, attr
                        )));
                    }
                }
            }
            for child in &object.children {
                match self.objects.get(child) {
                    Some(c) if c.is_element() => {}
                    _ => {
                        return Err(XsltProbeError::Schema(format!(
                            "Element {} references unknown child element {}",
                            object.id, child
                        )));
                    }
                }
            }
            let mut seen = HashSet::new();
            for attr in &object.attributes {
                if let Some(a) = self.objects.get(attr) {
                    if !seen.insert(a.name.as_str()) {
                        return Err(XsltProbeError::Schema(format!(
                            "Element {} declares attribute '{}' twice",
                            object.id, a.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn root(&self) -> &SchemaObject {
        // `check_references` guarantees the root exists.
        &self.objects[&self.root]
    }

    pub fn object(&self, id: &SchemaObjectId) -> Option<&SchemaObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: &SchemaObjectId) -> Option<&mut SchemaObject> {
        self.objects.get_mut(id)
    }

    /// Objects in declaration order.
    pub fn objects(&self) -> impl Iterator<Item = &SchemaObject> {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    pub fn find_by_name(&self, name: &str, kind: SchemaObjectKind) -> Vec<&SchemaObject> {
        self.objects()
            .filter(|o| o.kind == kind && o.name == name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl TryFrom<SchemaDocument> for XmlSchema {
    type Error = XsltProbeError;

    fn try_from(doc: SchemaDocument) -> Result<Self, Self::Error> {
        let version = doc.version.max(1);
        Ok(XmlSchema::new(doc.root, doc.objects)?.with_version(version))
    }
}

impl From<XmlSchema> for SchemaDocument {
    fn from(schema: XmlSchema) -> Self {
        let XmlSchema { version, root, order, mut objects } = schema;
        let objects = order.iter().filter_map(|id| objects.remove(id)).collect();
        SchemaDocument { version, root, objects }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<SchemaObject> {
        vec![
            SchemaObject::element("catalog", "catalog", ContentType::ElementOnly)
                .with_attributes(&["catalog@title"])
                .with_children(&["item"]),
            SchemaObject::attribute("catalog@title", "title", ValueConstraints::string()),
            SchemaObject::element("item", "item", ContentType::Text),
        ]
    }

    #[test]
    fn test_new_schema_defaults_to_version_one() {
        let schema = XmlSchema::new(SchemaObjectId::new("catalog"), catalog()).unwrap();
        assert_eq!(schema.version(), 1);
        assert_eq!(schema.root().name, "catalog");
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_missing_root_rejected() {
        let err = XmlSchema::new(SchemaObjectId::new("nope"), catalog()).unwrap_err();
        assert!(matches!(err, XsltProbeError::Schema(_)));
    }

    #[test]
    fn test_attribute_root_rejected() {
        assert!(XmlSchema::new(SchemaObjectId::new("catalog@title"), catalog()).is_err());
    }

    #[test]
    fn test_unknown_child_rejected() {
        let mut objects = catalog();
        objects[0].children.push(SchemaObjectId::new("ghost"));
        assert!(XmlSchema::new(SchemaObjectId::new("catalog"), objects).is_err());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut objects = catalog();
        objects.push(SchemaObject::element("item", "item", ContentType::Empty));
        assert!(XmlSchema::new(SchemaObjectId::new("catalog"), objects).is_err());
    }

    #[test]
    fn test_json_roundtrip_keeps_order_and_version() {
        let schema = XmlSchema::new(SchemaObjectId::new("catalog"), catalog())
            .unwrap()
            .with_version(4);
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: XmlSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version(), 4);
        let ids: Vec<&str> = parsed.objects().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["catalog", "catalog@title", "item"]);
    }

    #[test]
    fn test_parse_minimal_json() {
        let json = r#"{
            "root": "doc",
            "objects": [
                { "id": "doc", "name": "doc", "kind": "element", "content": "mixed" }
            ]
        }"#;
        let schema: XmlSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.version(), 1);
        assert_eq!(schema.root().content, ContentType::Mixed);
        assert_eq!(schema.root().constraints.data_type, DataType::String);
    }

    #[test]
    fn test_accepts_free_text() {
        assert!(ValueConstraints::string().accepts_free_text());
        assert!(!ValueConstraints::integer(None, None).accepts_free_text());
        assert!(!ValueConstraints::string()
            .with_discrete_values(&["a", "b"], true)
            .accepts_free_text());
        assert!(ValueConstraints::string()
            .with_discrete_values(&["a", "b"], false)
            .accepts_free_text());
    }
}
