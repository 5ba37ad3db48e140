use std::path::{Path, PathBuf};
use crate::errors::XsltProbeError;
use crate::models::{StylesheetRef, XssReport};
use super::formatter::format_report_markdown;
use tracing::info;

/// Writes `report.json` and `report.md` under `<output>/<stylesheet stem>/`.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn report_dir(&self, stylesheet: &StylesheetRef) -> PathBuf {
        self.output_dir.join(stylesheet.stem())
    }

    /// Returns the paths written, JSON first.
    pub async fn write(&self, stylesheet: &StylesheetRef, report: &XssReport) -> Result<Vec<PathBuf>, XsltProbeError> {
        let dir = self.report_dir(stylesheet);
        tokio::fs::create_dir_all(&dir).await?;

        let json = serde_json::to_string_pretty(report)
            .map_err(|e| XsltProbeError::Report(format!("Failed to serialize report: {}", e)))?;
        let json_path = dir.join("report.json");
        tokio::fs::write(&json_path, &json).await?;
        info!(path = %json_path.display(), findings = report.finding_count(), "Wrote report.json");

        let md_path = dir.join("report.md");
        tokio::fs::write(&md_path, format_report_markdown(report)).await?;
        info!(path = %md_path.display(), "Wrote report.md");

        Ok(vec![json_path, md_path])
    }
}
