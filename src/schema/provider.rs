use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use crate::errors::XsltProbeError;
use crate::models::StylesheetRef;
use super::model::XmlSchema;
use tracing::{debug, info};

/// Source of versioned schemas per stylesheet.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Load the initial schema for a stylesheet (idempotent).
    async fn load(&self, stylesheet: &StylesheetRef) -> Result<Arc<XmlSchema>, XsltProbeError>;

    /// A specific schema version, or the latest one when `version` is `None`.
    fn schema(
        &self,
        stylesheet: &StylesheetRef,
        version: Option<u32>,
    ) -> Result<Arc<XmlSchema>, XsltProbeError>;

    /// Store `schema` as the next version and return that version number.
    fn store(&self, stylesheet: &StylesheetRef, schema: XmlSchema) -> Result<u32, XsltProbeError>;
}

/// Reads `<stylesheet stem>.schema.json` files and keeps every evolved
/// version in memory.
pub struct SchemaRepository {
    schema_dir: Option<PathBuf>,
    versions: DashMap<StylesheetRef, Vec<Arc<XmlSchema>>>,
}

impl SchemaRepository {
    pub fn new(schema_dir: Option<PathBuf>) -> Self {
        Self {
            schema_dir,
            versions: DashMap::new(),
        }
    }

    /// Register an in-memory schema as version 1, replacing any history.
    pub fn register(&self, stylesheet: &StylesheetRef, schema: XmlSchema) -> Arc<XmlSchema> {
        let schema = Arc::new(schema.with_version(1));
        self.versions.insert(stylesheet.clone(), vec![schema.clone()]);
        schema
    }

    pub fn schema_path(&self, stylesheet: &StylesheetRef) -> PathBuf {
        match &self.schema_dir {
            Some(dir) => dir.join(format!("{}.schema.json", stylesheet.stem())),
            None => stylesheet.path().with_extension("schema.json"),
        }
    }

    pub fn version_count(&self, stylesheet: &StylesheetRef) -> usize {
        self.versions.get(stylesheet).map(|v| v.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SchemaProvider for SchemaRepository {
    async fn load(&self, stylesheet: &StylesheetRef) -> Result<Arc<XmlSchema>, XsltProbeError> {
        if let Some(latest) = self.versions.get(stylesheet).and_then(|v| v.last().cloned()) {
            debug!(stylesheet = %stylesheet, version = latest.version(), "Schema already loaded");
            return Ok(latest);
        }

        let path = self.schema_path(stylesheet);
        if !path.exists() {
            return Err(XsltProbeError::Schema(format!(
                "No schema found for {} (expected {})",
                stylesheet,
                path.display()
            )));
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let schema: XmlSchema = serde_json::from_str(&content)
            .map_err(|e| XsltProbeError::Schema(format!("{}: {}", path.display(), e)))?;
        info!(
            stylesheet = %stylesheet,
            path = %path.display(),
            objects = schema.len(),
            "Loaded schema"
        );

        let schema = Arc::new(schema.with_version(1));
        self.versions
            .entry(stylesheet.clone())
            .or_insert_with(|| vec![schema.clone()]);
        Ok(schema)
    }

    fn schema(
        &self,
        stylesheet: &StylesheetRef,
        version: Option<u32>,
    ) -> Result<Arc<XmlSchema>, XsltProbeError> {
        let versions = self.versions.get(stylesheet).ok_or_else(|| {
            XsltProbeError::Schema(format!("No schema loaded for {}", stylesheet))
        })?;
        let found = match version {
            None => versions.last().cloned(),
            Some(v) => versions.iter().find(|s| s.version() == v).cloned(),
        };
        found.ok_or_else(|| {
            XsltProbeError::Schema(format!(
                "Schema version {:?} not available for {}",
                version, stylesheet
            ))
        })
    }

    fn store(&self, stylesheet: &StylesheetRef, schema: XmlSchema) -> Result<u32, XsltProbeError> {
        let mut versions = self.versions.get_mut(stylesheet).ok_or_else(|| {
            XsltProbeError::Schema(format!("No schema loaded for {}", stylesheet))
        })?;
        let next = versions.last().map(|s| s.version()).unwrap_or(0) + 1;
        versions.push(Arc::new(schema.with_version(next)));
        info!(stylesheet = %stylesheet, version = next, "Stored evolved schema");
        Ok(next)
    }
}
