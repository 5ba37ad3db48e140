use std::collections::HashSet;
use std::path::Path;
use crate::errors::XsltProbeError;
use super::types::ProbeConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::warn;

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<ProbeConfig, XsltProbeError> {
    if !path.exists() {
        return Err(XsltProbeError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(XsltProbeError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<ProbeConfig, XsltProbeError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    // An empty file parses as null.
    if yaml.is_null() {
        return Ok(ProbeConfig::default());
    }

    validate_schema(&yaml)?;

    let config: ProbeConfig = serde_yaml::from_value(yaml)?;
    validate_conflicts(&config)?;
    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), XsltProbeError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| XsltProbeError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| XsltProbeError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        // Advisory: typed parsing and the conflict checks below are binding.
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

/// Detect semantic conflicts in the parsed configuration.
fn validate_conflicts(config: &ProbeConfig) -> Result<(), XsltProbeError> {
    if let Some(generator) = &config.generator {
        if let Some(ratio) = generator.discrete_value_selection_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(XsltProbeError::Config(format!(
                    "discrete_value_selection_ratio must be within 0..=1, got {}",
                    ratio
                )));
            }
        }
        if let Some(length) = generator.value_length {
            if length == 0 || length > 18 {
                return Err(XsltProbeError::Config(format!(
                    "value_length must be within 1..=18, got {}",
                    length
                )));
            }
        }
    }

    if let Some(process) = &config.process {
        if process.worker_threads == Some(0) {
            return Err(XsltProbeError::Config("worker_threads must be at least 1".into()));
        }
        if process.exploration_document_count == Some(0) && process.evolution_pass_limit.is_some_and(|n| n > 0) {
            return Err(XsltProbeError::Config(
                "evolution_pass_limit is set but exploration_document_count is 0, so the schema can never evolve"
                    .into(),
            ));
        }
        if process.xss_initial_document_count == Some(0) {
            warn!("xss_initial_document_count is 0, no XSS checks will run");
        }
    }

    if let Some(rules) = config.analysis.as_ref().and_then(|a| a.rules.as_ref()) {
        let mut seen = HashSet::new();
        for rule in rules {
            if !seen.insert(rule.as_str()) {
                return Err(XsltProbeError::Config(format!("Rule '{}' listed twice", rule)));
            }
        }
    }

    if let Some(processor) = config.xslt.as_ref().and_then(|x| x.processor.as_ref()) {
        if processor.is_empty() {
            return Err(XsltProbeError::Config("xslt.processor must not be empty".into()));
        }
        if !processor.iter().any(|arg| arg.contains("{stylesheet}")) {
            warn!("xslt.processor has no {{stylesheet}} placeholder");
        }
    }

    Ok(())
}
