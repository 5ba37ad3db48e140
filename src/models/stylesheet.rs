use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reference to the XSLT stylesheet under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StylesheetRef {
    path: PathBuf,
}

impl StylesheetRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn uri(&self) -> String {
        self.path.display().to_string()
    }

    /// File stem used for naming per-stylesheet artifacts.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stylesheet".to_string())
    }
}

impl std::fmt::Display for StylesheetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_strips_extension() {
        let s = StylesheetRef::new("/tmp/styles/catalog.xsl");
        assert_eq!(s.stem(), "catalog");
        assert_eq!(s.uri(), "/tmp/styles/catalog.xsl");
    }

    #[test]
    fn test_stem_fallback_for_empty_path() {
        let s = StylesheetRef::new("");
        assert_eq!(s.stem(), "stylesheet");
    }
}
