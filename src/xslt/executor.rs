use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use crate::errors::XsltProbeError;
use crate::models::StylesheetRef;
use tracing::debug;

/// `{stylesheet}` is replaced with the stylesheet path; the document is
/// written to the processor's stdin.
pub const DEFAULT_COMMAND: &[&str] = &["xsltproc", "{stylesheet}", "-"];

/// Applies a stylesheet to an XML document.
#[async_trait]
pub trait XsltExecutor: Send + Sync {
    async fn transform(&self, stylesheet: &StylesheetRef, xml: &str) -> Result<String, XsltProbeError>;
}

/// Runs an external XSLT processor per document.
#[derive(Debug, Clone)]
pub struct ProcessXsltExecutor {
    command: Vec<String>,
    timeout: Duration,
}

impl Default for ProcessXsltExecutor {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ProcessXsltExecutor {
    pub fn new(command: Vec<String>) -> Result<Self, XsltProbeError> {
        if command.is_empty() {
            return Err(XsltProbeError::Config("XSLT processor command is empty".to_string()));
        }
        Ok(Self {
            command,
            ..Default::default()
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_line(&self, stylesheet: &StylesheetRef) -> Vec<String> {
        let path = stylesheet.uri();
        self.command
            .iter()
            .map(|arg| arg.replace("{stylesheet}", &path))
            .collect()
    }

    async fn run(&self, args: &[String], xml: &str) -> Result<String, XsltProbeError> {
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| XsltProbeError::Config("XSLT processor command is empty".to_string()))?;
        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| XsltProbeError::Transform(format!("Failed to start {}: {}", program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = xml.as_bytes().to_vec();
            tokio::spawn(async move {
                // The processor may exit without reading its input.
                let _ = stdin.write_all(&input).await;
                let _ = stdin.shutdown().await;
            });
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| XsltProbeError::Transform(format!("{} failed: {}", program, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(XsltProbeError::Transform(format!(
                "{} exited with {}: {}",
                program,
                output.status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl XsltExecutor for ProcessXsltExecutor {
    async fn transform(&self, stylesheet: &StylesheetRef, xml: &str) -> Result<String, XsltProbeError> {
        let args = self.command_line(stylesheet);
        debug!(stylesheet = %stylesheet, command = %args.join(" "), bytes = xml.len(), "Transforming");

        tokio::time::timeout(self.timeout, self.run(&args, xml))
            .await
            .map_err(|_| XsltProbeError::Timeout(format!(
                "Transformation of {} timed out after {}ms",
                stylesheet,
                self.timeout.as_millis()
            )))?
    }
}
