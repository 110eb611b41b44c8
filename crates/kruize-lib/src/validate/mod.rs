//! Validation of `createExperiment` documents
//!
//! A document is first checked against the embedded JSON schema, then for
//! the value rules a schema cannot express: no blank values and a supported
//! optimization direction. Failures are returned as a readable message; the
//! caller decides whether to abort the upload.

use jsonschema::Validator;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

pub const VALUE_MISSING: &str = "Parameters cannot be empty or null!";
pub const DIRECTION_NOT_SUPPORTED: &str = "Direction not supported!";
pub const DIRECTIONS_SUPPORTED: &[&str] = &["maximize", "minimize"];

/// Type errors on these primitives mean a required value was null or blank
const NULLABLE_TYPES: &[&str] = &["string", "integer", "number"];

static SCHEMA_SOURCE: &str = include_str!("experiment_schema.json");
static SCHEMA: OnceLock<Value> = OnceLock::new();
static VALIDATOR: OnceLock<Validator> = OnceLock::new();

/// The schema experiment definitions are checked against
pub fn experiment_schema() -> &'static Value {
    SCHEMA.get_or_init(|| {
        serde_json::from_str(SCHEMA_SOURCE).expect("embedded experiment schema is valid JSON")
    })
}

fn validator() -> &'static Validator {
    VALIDATOR.get_or_init(|| {
        jsonschema::validator_for(experiment_schema()).expect("embedded experiment schema compiles")
    })
}

/// Why an experiment definition was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    message: String,
}

impl ValidationFailure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Validate an experiment-definition array
pub fn validate_experiment_input(document: &Value) -> Result<(), ValidationFailure> {
    if let Some(error) = validator().iter_errors(document).next() {
        return Err(ValidationFailure::new(schema_message(&error.to_string())));
    }

    let mut messages: Vec<&'static str> = Vec::new();
    if let Value::Array(experiments) = document {
        for experiment in experiments {
            check_values(None, experiment, &mut messages);
        }
    }

    if messages.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure::new(messages.join(",")))
    }
}

/// Normalize a schema validator message for users
fn schema_message(raw: &str) -> String {
    let mistyped = NULLABLE_TYPES.iter().any(|t| {
        raw.contains(&format!("is not of type \"{}\"", t))
            || raw.contains(&format!("is not of type '{}'", t))
    });
    if mistyped {
        return VALUE_MISSING.to_string();
    }
    match raw.split_once('(') {
        Some((head, _)) => head.to_string(),
        None => raw.to_string(),
    }
}

fn check_values(key: Option<&str>, value: &Value, messages: &mut Vec<&'static str>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                check_values(Some(k.as_str()), v, messages);
            }
        }
        Value::Array(items) => {
            for item in items {
                check_values(key, item, messages);
            }
        }
        Value::Null => push_unique(messages, VALUE_MISSING),
        Value::String(s) if s.trim().is_empty() => push_unique(messages, VALUE_MISSING),
        Value::String(s)
            if key == Some("direction") && !DIRECTIONS_SUPPORTED.contains(&s.as_str()) =>
        {
            push_unique(messages, DIRECTION_NOT_SUPPORTED)
        }
        _ => {}
    }
}

fn push_unique(messages: &mut Vec<&'static str>, message: &'static str) {
    if !messages.contains(&message) {
        messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn experiment() -> Value {
        json!([{
            "version": "v2.0",
            "experiment_name": "frontend|deployment|prod",
            "cluster_name": "e23-alias",
            "performance_profile": "resource-optimization-openshift",
            "mode": "monitor",
            "target_cluster": "remote",
            "kubernetes_objects": [{
                "type": "deployment",
                "name": "frontend",
                "namespace": "prod",
                "containers": [{
                    "container_image_name": "quay.io/web:1",
                    "container_name": "web"
                }]
            }],
            "slo": {
                "objective_function": {"function_type": "expression", "expression": "throughput"},
                "direction": "maximize"
            },
            "trial_settings": {"measurement_duration": "15min"},
            "recommendation_settings": {"threshold": "0.1"}
        }])
    }

    #[test]
    fn test_valid_document_passes() {
        assert_eq!(validate_experiment_input(&experiment()), Ok(()));
    }

    #[test]
    fn test_unsupported_direction() {
        let mut doc = experiment();
        doc[0]["slo"]["direction"] = json!("optimize");
        let failure = validate_experiment_input(&doc).unwrap_err();
        assert_eq!(failure.message(), DIRECTION_NOT_SUPPORTED);
    }

    #[test]
    fn test_minimize_is_supported() {
        let mut doc = experiment();
        doc[0]["slo"]["direction"] = json!("minimize");
        assert!(validate_experiment_input(&doc).is_ok());
    }

    #[test]
    fn test_namespaces_and_containers_are_exclusive() {
        let mut doc = experiment();
        doc[0]["kubernetes_objects"][0]["namespaces"] = json!({"namespace_name": "prod"});
        assert!(validate_experiment_input(&doc).is_err());
    }

    #[test]
    fn test_namespace_level_object_is_accepted() {
        let mut doc = experiment();
        doc[0]["kubernetes_objects"] = json!([{"namespaces": {"namespace_name": "prod"}}]);
        assert!(validate_experiment_input(&doc).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let mut doc = experiment();
        doc[0].as_object_mut().unwrap().remove("cluster_name");
        let failure = validate_experiment_input(&doc).unwrap_err();
        assert!(failure.message().contains("cluster_name"), "{}", failure);
    }

    #[test]
    fn test_null_value_is_reported_as_missing() {
        let mut doc = experiment();
        doc[0]["mode"] = Value::Null;
        let failure = validate_experiment_input(&doc).unwrap_err();
        assert_eq!(failure.message(), VALUE_MISSING);
    }

    #[test]
    fn test_blank_value_is_reported_as_missing() {
        let mut doc = experiment();
        doc[0]["trial_settings"]["measurement_duration"] = json!("   ");
        doc[0]["slo"]["direction"] = json!("sideways");
        let failure = validate_experiment_input(&doc).unwrap_err();
        let mut parts: Vec<&str> = failure.message().split(',').collect();
        parts.sort_unstable();
        assert_eq!(parts, vec![DIRECTION_NOT_SUPPORTED, VALUE_MISSING]);
    }

    #[test]
    fn test_message_truncated_at_parenthesis() {
        assert_eq!(
            schema_message("Additional properties are not allowed ('foo' was unexpected)"),
            "Additional properties are not allowed "
        );
        assert_eq!(schema_message("\"mode\" is a required property"), "\"mode\" is a required property");
        assert_eq!(schema_message("null is not of type \"string\""), VALUE_MISSING);
        assert_eq!(
            schema_message("\"x\" is not of type \"array\""),
            "\"x\" is not of type \"array\""
        );
    }
}
