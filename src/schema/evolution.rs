use crate::generator::validation::{validate_value, ConstraintViolation};
use crate::models::{DocumentModifier, GenerationRuleId};
use super::model::{DataType, DiscreteValues, XmlSchema};
use tracing::{debug, info};

/// Derives a new schema version from collected modifiers.
pub trait SchemaEvolver: Send + Sync {
    /// Returns the evolved schema, or `None` when nothing changed.
    fn evolve(&self, schema: &XmlSchema, modifiers: &[DocumentModifier]) -> Option<XmlSchema>;
}

/// Relaxes constraints until every modifier value fits its slot and records
/// schema-level literals as advisory discrete values.
#[derive(Debug, Default)]
pub struct ConstraintRelaxingEvolver;

// Each relaxation removes one violation; a value can violate at most this many.
const MAX_RELAXATIONS: usize = 4;

impl SchemaEvolver for ConstraintRelaxingEvolver {
    fn evolve(&self, schema: &XmlSchema, modifiers: &[DocumentModifier]) -> Option<XmlSchema> {
        let mut evolved = schema.clone();
        let mut changed = false;

        for modifier in modifiers {
            let Some(object) = evolved.object_mut(&modifier.schema_object) else {
                debug!(object = %modifier.schema_object, "Modifier names unknown schema object");
                continue;
            };
            let constraints = &mut object.constraints;

            for _ in 0..MAX_RELAXATIONS {
                let violation = match validate_value(constraints, &modifier.value) {
                    Ok(()) => break,
                    Err(v) => v,
                };
                debug!(object = %modifier.schema_object, violation = %violation, "Relaxing constraint");
                match violation {
                    ConstraintViolation::NotBoolean | ConstraintViolation::NotInteger => {
                        constraints.data_type = DataType::String;
                        constraints.min_value = None;
                        constraints.max_value = None;
                    }
                    ConstraintViolation::BelowMinimum { value, .. } => {
                        constraints.min_value = Some(value);
                    }
                    ConstraintViolation::AboveMaximum { value, .. } => {
                        constraints.max_value = Some(value);
                    }
                    ConstraintViolation::TooLong { length, .. } => {
                        constraints.max_length = Some(length);
                    }
                    ConstraintViolation::NotInFixedSet => {
                        if let Some(set) = constraints.discrete_values.as_mut() {
                            set.values.push(modifier.value.clone());
                        }
                    }
                }
                changed = true;
            }

            // Literals found in the stylesheet itself become sampling hints.
            if modifier.generation_rule == GenerationRuleId::SCHEMA {
                let set = constraints.discrete_values.get_or_insert_with(DiscreteValues::default);
                if !set.values.contains(&modifier.value) {
                    set.values.push(modifier.value.clone());
                    changed = true;
                }
            }
        }

        if changed {
            info!(from_version = schema.version(), modifiers = modifiers.len(), "Schema evolved");
            Some(evolved)
        } else {
            None
        }
    }
}
