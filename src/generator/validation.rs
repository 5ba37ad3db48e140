use crate::schema::{DataType, ValueConstraints};

/// Why a requested value does not fit its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    NotBoolean,
    NotInteger,
    BelowMinimum { min: i64, value: i64 },
    AboveMaximum { max: i64, value: i64 },
    TooLong { max_length: usize, length: usize },
    NotInFixedSet,
}

impl std::fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotBoolean => write!(f, "not a boolean literal"),
            Self::NotInteger => write!(f, "not an integer"),
            Self::BelowMinimum { min, value } => write!(f, "{} is below minimum {}", value, min),
            Self::AboveMaximum { max, value } => write!(f, "{} is above maximum {}", value, max),
            Self::TooLong { max_length, length } => {
                write!(f, "length {} exceeds maximum {}", length, max_length)
            }
            Self::NotInFixedSet => write!(f, "not a member of the fixed value set"),
        }
    }
}

/// Check `value` against the declared type and constraints of a slot.
pub fn validate_value(constraints: &ValueConstraints, value: &str) -> Result<(), ConstraintViolation> {
    match constraints.data_type {
        DataType::Boolean => validate_boolean(value),
        DataType::Integer => validate_integer(constraints, value),
        DataType::String => validate_string(constraints, value),
    }
}

fn validate_boolean(value: &str) -> Result<(), ConstraintViolation> {
    match value {
        "true" | "false" => Ok(()),
        _ => Err(ConstraintViolation::NotBoolean),
    }
}

fn validate_integer(constraints: &ValueConstraints, value: &str) -> Result<(), ConstraintViolation> {
    let parsed: i64 = value.parse().map_err(|_| ConstraintViolation::NotInteger)?;

    if let Some(min) = constraints.min_value {
        if parsed < min {
            return Err(ConstraintViolation::BelowMinimum { min, value: parsed });
        }
    }
    if let Some(max) = constraints.max_value {
        if parsed > max {
            return Err(ConstraintViolation::AboveMaximum { max, value: parsed });
        }
    }

    if let Some(fixed) = constraints.fixed_values() {
        let member = fixed
            .iter()
            .any(|v| v == value || v.trim().parse::<i64>().ok() == Some(parsed));
        if !member {
            return Err(ConstraintViolation::NotInFixedSet);
        }
    }
    Ok(())
}

fn validate_string(constraints: &ValueConstraints, value: &str) -> Result<(), ConstraintViolation> {
    if let Some(max_length) = constraints.max_length {
        let length = value.chars().count();
        if length > max_length {
            return Err(ConstraintViolation::TooLong { max_length, length });
        }
    }

    if let Some(fixed) = constraints.fixed_values() {
        if !fixed.iter().any(|v| v == value) {
            return Err(ConstraintViolation::NotInFixedSet);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_literals_only() {
        let c = ValueConstraints::boolean();
        assert!(validate_value(&c, "true").is_ok());
        assert!(validate_value(&c, "false").is_ok());
        assert_eq!(validate_value(&c, "TRUE"), Err(ConstraintViolation::NotBoolean));
        assert_eq!(validate_value(&c, "1"), Err(ConstraintViolation::NotBoolean));
    }

    #[test]
    fn test_integer_must_parse() {
        let c = ValueConstraints::integer(None, None);
        assert!(validate_value(&c, "-42").is_ok());
        assert_eq!(validate_value(&c, "4.2"), Err(ConstraintViolation::NotInteger));
        assert_eq!(validate_value(&c, "<script>"), Err(ConstraintViolation::NotInteger));
    }

    #[test]
    fn test_integer_range() {
        let c = ValueConstraints::integer(Some(1), Some(10));
        assert!(validate_value(&c, "1").is_ok());
        assert!(validate_value(&c, "10").is_ok());
        assert_eq!(
            validate_value(&c, "0"),
            Err(ConstraintViolation::BelowMinimum { min: 1, value: 0 })
        );
        assert_eq!(
            validate_value(&c, "11"),
            Err(ConstraintViolation::AboveMaximum { max: 10, value: 11 })
        );
    }

    #[test]
    fn test_integer_fixed_set() {
        let c = ValueConstraints::integer(None, None).with_discrete_values(&["1", "2"], true);
        assert!(validate_value(&c, "2").is_ok());
        assert_eq!(validate_value(&c, "3"), Err(ConstraintViolation::NotInFixedSet));
    }

    #[test]
    fn test_integer_advisory_set_allows_others() {
        let c = ValueConstraints::integer(None, None).with_discrete_values(&["1", "2"], false);
        assert!(validate_value(&c, "3").is_ok());
    }

    #[test]
    fn test_string_max_length_counts_chars() {
        let c = ValueConstraints::string().with_max_length(3);
        assert!(validate_value(&c, "äöü").is_ok());
        assert_eq!(
            validate_value(&c, "abcd"),
            Err(ConstraintViolation::TooLong { max_length: 3, length: 4 })
        );
    }

    #[test]
    fn test_string_fixed_set() {
        let c = ValueConstraints::string().with_discrete_values(&["red", "green"], true);
        assert!(validate_value(&c, "red").is_ok());
        assert_eq!(validate_value(&c, "blue"), Err(ConstraintViolation::NotInFixedSet));
    }

    #[test]
    fn test_violation_display() {
        let v = ConstraintViolation::TooLong { max_length: 3, length: 5 };
        assert_eq!(v.to_string(), "length 5 exceeds maximum 3");
    }
}
