use super::state::ProcessState;

pub struct PhaseDefinition {
    pub name: ProcessState,
    pub display_name: &'static str,
    pub description: &'static str,
}

pub static PHASES: &[PhaseDefinition] = &[
    PhaseDefinition {
        name: ProcessState::New,
        display_name: "Queued",
        description: "Director created, waiting to start",
    },
    PhaseDefinition {
        name: ProcessState::Initialize,
        display_name: "Initialization",
        description: "Loading the stylesheet and its input schema",
    },
    PhaseDefinition {
        name: ProcessState::StaticCheck,
        display_name: "Static Check",
        description: "Scanning the stylesheet for literal comparisons and unescaped output",
    },
    PhaseDefinition {
        name: ProcessState::StaticResultProcessing,
        display_name: "Static Results",
        description: "Folding static findings into the schema",
    },
    PhaseDefinition {
        name: ProcessState::ExploreSchema,
        display_name: "Schema Exploration",
        description: "Transforming generated documents to probe the schema",
    },
    PhaseDefinition {
        name: ProcessState::EvolveSchema,
        display_name: "Schema Evolution",
        description: "Deriving a new schema version from exploration results",
    },
    PhaseDefinition {
        name: ProcessState::CheckXss,
        display_name: "XSS Check",
        description: "Proposing and verifying injections in transformation output",
    },
    PhaseDefinition {
        name: ProcessState::CompileReport,
        display_name: "Report",
        description: "Consolidating verified injections into a report",
    },
    PhaseDefinition {
        name: ProcessState::Done,
        display_name: "Done",
        description: "Processing finished",
    },
];

pub fn display_name(state: ProcessState) -> &'static str {
    PHASES
        .iter()
        .find(|p| p.name == state)
        .map(|p| p.display_name)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_state_has_a_phase() {
        assert_eq!(PHASES.len(), 9);
        assert_eq!(display_name(ProcessState::CheckXss), "XSS Check");
    }
}
