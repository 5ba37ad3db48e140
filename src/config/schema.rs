use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "process": {
                "type": "object",
                "properties": {
                    "exploration_document_count": { "type": "integer", "minimum": 0 },
                    "xss_initial_document_count": { "type": "integer", "minimum": 0 },
                    "evolution_pass_limit": { "type": "integer", "minimum": 0 },
                    "worker_threads": { "type": "integer", "minimum": 1 }
                }
            },
            "generator": {
                "type": "object",
                "properties": {
                    "discrete_value_selection_ratio": { "type": "number", "minimum": 0, "maximum": 1 },
                    "value_length": { "type": "integer", "minimum": 1, "maximum": 18 },
                    "max_depth": { "type": "integer", "minimum": 0 },
                    "seed": { "type": "integer", "minimum": 0 }
                }
            },
            "analysis": {
                "type": "object",
                "properties": {
                    "rules": { "type": "array", "items": { "type": "string" } }
                }
            },
            "xslt": {
                "type": "object",
                "properties": {
                    "processor": { "type": "array", "items": { "type": "string" }, "minItems": 1 },
                    "transform_timeout_secs": { "type": "integer", "minimum": 1 }
                }
            },
            "schema": {
                "type": "object",
                "properties": {
                    "directory": { "type": "string" }
                }
            },
            "output": {
                "type": "object",
                "properties": {
                    "directory": { "type": "string" }
                }
            }
        }
    })
});
