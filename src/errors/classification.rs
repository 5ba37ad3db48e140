use super::types::XsltProbeError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    /// Misconfiguration of the run itself rather than a failure of one task.
    pub configuration: bool,
}

impl XsltProbeError {
    /// Classify this error to tell a broken run configuration apart from
    /// a failure that only affects a single task or stylesheet.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Configuration errors
            XsltProbeError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                configuration: true,
            },
            XsltProbeError::UnknownRule(_) => ErrorClassification {
                error_type: "UnknownRuleError",
                configuration: true,
            },
            XsltProbeError::AmbiguousRule(..) => ErrorClassification {
                error_type: "AmbiguousRuleError",
                configuration: true,
            },
            XsltProbeError::DuplicateRule(_) => ErrorClassification {
                error_type: "DuplicateRuleError",
                configuration: true,
            },
            XsltProbeError::Selector(_) => ErrorClassification {
                error_type: "SelectorError",
                configuration: true,
            },
            XsltProbeError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                configuration: true,
            },

            // Per-task failures
            XsltProbeError::Schema(_) => ErrorClassification {
                error_type: "SchemaError",
                configuration: false,
            },
            XsltProbeError::Generation(_) => ErrorClassification {
                error_type: "GenerationError",
                configuration: false,
            },
            XsltProbeError::Transform(_) => ErrorClassification {
                error_type: "TransformError",
                configuration: false,
            },
            XsltProbeError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                configuration: false,
            },
            XsltProbeError::Analysis(_) => ErrorClassification {
                error_type: "AnalysisError",
                configuration: false,
            },
            XsltProbeError::Xml(_) => ErrorClassification {
                error_type: "XmlError",
                configuration: false,
            },
            XsltProbeError::Report(_) => ErrorClassification {
                error_type: "ReportError",
                configuration: false,
            },
            XsltProbeError::Pool(_) => ErrorClassification {
                error_type: "PoolError",
                configuration: false,
            },
            XsltProbeError::AlreadySubmitted(_) => ErrorClassification {
                error_type: "AlreadySubmittedError",
                configuration: false,
            },
            XsltProbeError::Aborted(_) => ErrorClassification {
                error_type: "AbortedError",
                configuration: false,
            },
            XsltProbeError::Io(_) => ErrorClassification {
                error_type: "IoError",
                configuration: false,
            },
            XsltProbeError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                configuration: false,
            },
            XsltProbeError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                configuration: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_configuration() {
        let err = XsltProbeError::Config("bad count".into());
        let class = err.classify();
        assert!(class.configuration);
        assert_eq!(class.error_type, "ConfigError");
    }

    #[test]
    fn test_unknown_rule_is_configuration() {
        let err = XsltProbeError::UnknownRule("xss.nope".into());
        assert!(err.classify().configuration);
    }

    #[test]
    fn test_ambiguous_rule_is_configuration() {
        let err = XsltProbeError::AmbiguousRule("xss.dup".into(), 2);
        let class = err.classify();
        assert!(class.configuration);
        assert_eq!(class.error_type, "AmbiguousRuleError");
    }

    #[test]
    fn test_transform_error_is_task_failure() {
        let err = XsltProbeError::Transform("xsltproc exited with 6".into());
        assert!(!err.classify().configuration);
    }

    #[test]
    fn test_timeout_is_task_failure() {
        let err = XsltProbeError::Timeout("transform took too long".into());
        let class = err.classify();
        assert!(!class.configuration);
        assert_eq!(class.error_type, "TimeoutError");
    }

    #[test]
    fn test_ambiguous_rule_message_names_count() {
        let err = XsltProbeError::AmbiguousRule("xss.dup".into(), 3);
        assert_eq!(err.to_string(), "Ambiguous analyzer rule: 'xss.dup' matches 3 registered rules");
    }
}
