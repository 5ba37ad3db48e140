use serde::{Deserialize, Serialize};
use super::document::{GenerationRuleId, SchemaObjectId};

/// Provenance of one generated value: which slot produced it and whether it
/// was an accepted requested value or synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDescriptor {
    pub schema_object: SchemaObjectId,
    pub generation_rule: GenerationRuleId,
    pub value: String,
    pub requested: bool,
}
