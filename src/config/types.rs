use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::generator::GeneratorSettings;
use crate::pipeline::DirectorSettings;
use crate::xslt::DEFAULT_COMMAND;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProbeConfig {
    pub process: Option<ProcessConfig>,
    pub generator: Option<GeneratorConfig>,
    pub analysis: Option<AnalysisConfig>,
    pub xslt: Option<XsltConfig>,
    pub schema: Option<SchemaConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProcessConfig {
    pub exploration_document_count: Option<usize>,
    pub xss_initial_document_count: Option<usize>,
    pub evolution_pass_limit: Option<u32>,
    pub worker_threads: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GeneratorConfig {
    pub discrete_value_selection_ratio: Option<f64>,
    pub value_length: Option<usize>,
    pub max_depth: Option<usize>,
    /// Fixed seed for reproducible documents.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AnalysisConfig {
    pub rules: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct XsltConfig {
    /// Processor command line; `{stylesheet}` is replaced with the stylesheet
    /// path and the document is passed on stdin.
    pub processor: Option<Vec<String>>,
    pub transform_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SchemaConfig {
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OutputConfig {
    pub directory: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub director: DirectorSettings,
    pub generator: GeneratorSettings,
    pub value_length: usize,
    pub max_depth: usize,
    pub seed: Option<u64>,
    pub worker_threads: usize,
    /// Empty means every shipped rule.
    pub rules: Vec<String>,
    pub processor: Vec<String>,
    pub transform_timeout: Duration,
    pub schema_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            director: DirectorSettings::default(),
            generator: GeneratorSettings::default(),
            value_length: 6,
            max_depth: crate::tasks::factory::DEFAULT_MAX_DEPTH,
            seed: None,
            worker_threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            rules: Vec::new(),
            processor: DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect(),
            transform_timeout: Duration::from_secs(30),
            schema_dir: None,
            output_dir: PathBuf::from("./results"),
        }
    }
}

impl RunSettings {
    /// Defaults overlaid with every value the config file sets.
    pub fn from_config(config: &ProbeConfig) -> Self {
        let mut settings = Self::default();
        if let Some(process) = &config.process {
            if let Some(n) = process.exploration_document_count {
                settings.director.exploration_document_count = n;
            }
            if let Some(n) = process.xss_initial_document_count {
                settings.director.xss_initial_document_count = n;
            }
            if let Some(n) = process.evolution_pass_limit {
                settings.director.evolution_pass_limit = n;
            }
            if let Some(n) = process.worker_threads {
                settings.worker_threads = n;
            }
        }
        if let Some(generator) = &config.generator {
            if let Some(ratio) = generator.discrete_value_selection_ratio {
                settings.generator.discrete_value_selection_ratio = ratio;
            }
            if let Some(n) = generator.value_length {
                settings.value_length = n;
            }
            if let Some(n) = generator.max_depth {
                settings.max_depth = n;
            }
            settings.seed = generator.seed;
        }
        if let Some(rules) = config.analysis.as_ref().and_then(|a| a.rules.clone()) {
            settings.rules = rules;
        }
        if let Some(xslt) = &config.xslt {
            if let Some(processor) = &xslt.processor {
                settings.processor = processor.clone();
            }
            if let Some(secs) = xslt.transform_timeout_secs {
                settings.transform_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(dir) = config.schema.as_ref().and_then(|s| s.directory.as_ref()) {
            settings.schema_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = config.output.as_ref().and_then(|o| o.directory.as_ref()) {
            settings.output_dir = PathBuf::from(dir);
        }
        settings
    }
}
