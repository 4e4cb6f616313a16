//! Tool argument validation against advertised input schemas.

use crate::error::{AdapterError, Result, ValidationError};
use jsonschema::error::ValidationErrorKind;
use rmcp::model::JsonObject;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// Minimum Jaro similarity for an unknown key to be offered as a typo of a known one.
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// One reason the arguments were rejected, as reported in the JSON-RPC error `data`.
#[derive(Debug, Clone, PartialEq)]
enum Violation {
    UnknownParameter {
        parameter: String,
        suggestions: Vec<String>,
        known: Vec<String>,
    },
    MissingParameter(String),
    Constraint {
        message: String,
        instance_path: String,
    },
    Decode(String),
}

impl Violation {
    fn to_json(&self) -> Value {
        match self {
            Self::UnknownParameter {
                parameter,
                suggestions,
                known,
            } => json!({
                "type": "invalid-parameter",
                "parameter": parameter,
                "suggestions": suggestions,
                "validParameters": known,
            }),
            Self::MissingParameter(parameter) => json!({
                "type": "missing-required-parameter",
                "parameter": parameter,
            }),
            Self::Constraint {
                message,
                instance_path,
            } => json!({
                "type": "constraint-violation",
                "message": message,
                "instancePath": instance_path,
            }),
            Self::Decode(message) => json!({
                "type": "decode-error",
                "message": message,
            }),
        }
    }
}

/// Validate `input` against `schema` and decode it into `T`.
///
/// All violations are collected so the caller sees every problem at once. Top-level keys
/// are checked by hand to attach "did you mean" suggestions; everything else is left to
/// the JSON Schema validator.
///
/// # Errors
///
/// Returns [`AdapterError::Validation`] if the arguments violate the schema or do not decode
/// into `T`, and [`AdapterError::Registry`] if `schema` itself is not a valid JSON Schema.
pub fn validate<T: DeserializeOwned>(input: &Value, schema: &JsonObject) -> Result<T> {
    let Some(arguments) = input.as_object() else {
        let not_object = Violation::Constraint {
            message: "expected object".to_string(),
            instance_path: String::new(),
        };
        return Err(ValidationError::new(
            "Invalid params: arguments must be a JSON object",
            vec![not_object.to_json()],
        )
        .into());
    };

    let mut violations = top_level_violations(arguments, schema);
    violations.extend(constraint_violations(input, schema)?);
    if !violations.is_empty() {
        return Err(rejection(violations).into());
    }

    serde_json::from_value(input.clone())
        .map_err(|e| rejection(vec![Violation::Decode(e.to_string())]).into())
}

/// Compile `schema`, reporting why it is unusable.
///
/// # Errors
///
/// Returns [`AdapterError::Registry`] if `schema` is not a valid JSON Schema.
pub fn compile(schema: &JsonObject) -> Result<jsonschema::Validator> {
    jsonschema::validator_for(&Value::Object(schema.clone()))
        .map_err(|e| AdapterError::Registry(format!("input schema does not compile: {e}")))
}

fn top_level_violations(arguments: &Map<String, Value>, schema: &JsonObject) -> Vec<Violation> {
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let known: Vec<String> = properties.keys().cloned().collect();

    let unknown = arguments
        .keys()
        .filter(|key| !properties.contains_key(*key))
        .map(|key| Violation::UnknownParameter {
            parameter: key.clone(),
            suggestions: suggestions(key, &known),
            known: known.clone(),
        });

    let missing = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|name| !arguments.contains_key(*name))
        .map(|name| Violation::MissingParameter(name.to_string()));

    unknown.chain(missing).collect()
}

fn constraint_violations(input: &Value, schema: &JsonObject) -> Result<Vec<Violation>> {
    let validator = compile(schema)?;
    let violations = validator
        .iter_errors(input)
        .filter_map(|e| {
            let instance_path = e.instance_path().to_string();
            // Already reported by `top_level_violations` with a friendlier shape.
            let at_root = instance_path.is_empty()
                && matches!(
                    e.kind(),
                    ValidationErrorKind::Required { .. }
                        | ValidationErrorKind::AdditionalProperties { .. }
                );
            (!at_root).then(|| Violation::Constraint {
                message: e.to_string(),
                instance_path,
            })
        })
        .collect();
    Ok(violations)
}

fn rejection(violations: Vec<Violation>) -> ValidationError {
    let message = violations
        .iter()
        .find_map(|v| match v {
            Violation::UnknownParameter {
                parameter,
                suggestions,
                ..
            } => Some(match suggestions.first() {
                Some(s) => format!(
                    "Invalid params: unknown parameter '{parameter}' (did you mean '{s}'?)"
                ),
                None => format!("Invalid params: unknown parameter '{parameter}'"),
            }),
            _ => None,
        })
        .unwrap_or_else(|| match violations.as_slice() {
            [Violation::Decode(e)] => format!("Invalid params: {e}"),
            _ => format!(
                "Invalid params: validation failed with {} error(s)",
                violations.len()
            ),
        });

    ValidationError::new(message, violations.iter().map(Violation::to_json).collect())
}

/// Known names close to `unknown`, best match first.
fn suggestions(unknown: &str, known: &[String]) -> Vec<String> {
    let mut scored: Vec<(f64, &String)> = known
        .iter()
        .map(|k| (strsim::jaro(unknown, k), k))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, k)| k.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Args {
        names: Vec<String>,
        #[serde(default)]
        mode: Option<String>,
    }

    fn schema() -> JsonObject {
        json!({
            "type": "object",
            "properties": {
                "names": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "maxItems": 2
                },
                "mode": { "type": "string", "enum": ["fast", "slow"] }
            },
            "required": ["names"],
            "additionalProperties": false
        })
        .as_object()
        .cloned()
        .expect("object schema")
    }

    fn rejected(input: &Value) -> ValidationError {
        match validate::<Args>(input, &schema()) {
            Err(AdapterError::Validation(e)) => e,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_arguments_decode() {
        let args: Args =
            validate(&json!({"names": ["a"], "mode": "fast"}), &schema()).expect("valid");
        assert_eq!(args.names, vec!["a".to_string()]);
        assert_eq!(args.mode.as_deref(), Some("fast"));
    }

    #[test]
    fn missing_required_parameter_is_reported() {
        let err = rejected(&json!({}));
        assert!(err.violations.iter().any(|v| {
            v["type"] == "missing-required-parameter" && v["parameter"] == "names"
        }));
    }

    #[test]
    fn unknown_parameter_gets_a_suggestion() {
        let err = rejected(&json!({"names": ["a"], "nmaes": 1}));
        assert_eq!(
            err.message,
            "Invalid params: unknown parameter 'nmaes' (did you mean 'names'?)"
        );
        assert_eq!(err.violations.len(), 1, "{:?}", err.violations);
        assert_eq!(err.violations[0]["validParameters"], json!(["names", "mode"]));
    }

    #[test]
    fn unrelated_unknown_parameter_has_no_suggestion() {
        let err = rejected(&json!({"names": ["a"], "zzz": 1}));
        assert_eq!(err.message, "Invalid params: unknown parameter 'zzz'");
    }

    #[test]
    fn constraint_violations_are_collected() {
        let err = rejected(&json!({"names": [], "mode": "medium"}));
        let constraint_count = err
            .violations
            .iter()
            .filter(|v| v["type"] == "constraint-violation")
            .count();
        assert_eq!(constraint_count, 2, "{:?}", err.violations);
        assert_eq!(
            err.message,
            "Invalid params: validation failed with 2 error(s)"
        );
        assert_eq!(err.data()["type"], "validation-errors");
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let err = rejected(&json!(["a"]));
        assert!(err.message.contains("JSON object"));
    }

    #[test]
    fn broken_schema_is_an_error_not_a_pass() {
        let broken = json!({"type": 12})
            .as_object()
            .cloned()
            .expect("object schema");
        let err = validate::<Value>(&json!({}), &broken).expect_err("schema must compile");
        assert!(matches!(err, AdapterError::Registry(_)), "{err:?}");
    }
}
