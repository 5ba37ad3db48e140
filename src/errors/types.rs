use thiserror::Error;

#[derive(Debug, Error)]
pub enum XsltProbeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Unknown analyzer rule: {0}")]
    UnknownRule(String),

    #[error("Ambiguous analyzer rule: '{0}' matches {1} registered rules")]
    AmbiguousRule(String, usize),

    #[error("Duplicate analyzer rule: {0}")]
    DuplicateRule(String),

    #[error("Invalid element selector: {0}")]
    Selector(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Worker pool error: {0}")]
    Pool(String),

    #[error("Stylesheet already submitted: {0}")]
    AlreadySubmitted(String),

    #[error("Processing aborted: {0}")]
    Aborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
