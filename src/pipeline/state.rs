use serde::{Deserialize, Serialize};

/// Which phases a Director runs. Fixed at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    #[default]
    Full,
    SchemaOnly,
    XssOnly,
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::SchemaOnly => write!(f, "schema-only"),
            Self::XssOnly => write!(f, "xss-only"),
        }
    }
}

impl std::str::FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "schema-only" => Ok(Self::SchemaOnly),
            "xss-only" => Ok(Self::XssOnly),
            other => Err(format!("unknown processing mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessState {
    New,
    Initialize,
    StaticCheck,
    StaticResultProcessing,
    ExploreSchema,
    EvolveSchema,
    CheckXss,
    CompileReport,
    Done,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Initialize => write!(f, "initialize"),
            Self::StaticCheck => write!(f, "static-check"),
            Self::StaticResultProcessing => write!(f, "static-result-processing"),
            Self::ExploreSchema => write!(f, "explore-schema"),
            Self::EvolveSchema => write!(f, "evolve-schema"),
            Self::CheckXss => write!(f, "check-xss"),
            Self::CompileReport => write!(f, "compile-report"),
            Self::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorSettings {
    pub exploration_document_count: usize,
    pub xss_initial_document_count: usize,
    pub evolution_pass_limit: u32,
}

impl Default for DirectorSettings {
    fn default() -> Self {
        Self {
            exploration_document_count: 3,
            xss_initial_document_count: 5,
            evolution_pass_limit: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorStats {
    pub tasks_submitted: usize,
    pub tasks_failed: usize,
    pub follow_up_tasks: usize,
    pub evolution_passes: u32,
    pub modifiers_collected: usize,
    /// Exploration failed for every document and the run was abandoned.
    pub aborted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trips_through_str() {
        for mode in [ProcessingMode::Full, ProcessingMode::SchemaOnly, ProcessingMode::XssOnly] {
            assert_eq!(mode.to_string().parse::<ProcessingMode>().unwrap(), mode);
        }
        assert!("partial".parse::<ProcessingMode>().is_err());
    }

    #[test]
    fn test_state_serializes_kebab_case() {
        let json = serde_json::to_string(&ProcessState::StaticResultProcessing).unwrap();
        assert_eq!(json, "\"static-result-processing\"");
    }
}
