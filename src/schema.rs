//! Structured output schemas
//!
//! An [`OutputSchema`] is a JSON schema describing the object an agent must
//! produce as its final answer. It is checked once when the agent is built
//! and again against every final answer the model returns.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentsError, Result};

/// The structured answer every persona produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FinalResult {
    /// The customer's query, possibly rephrased by the handling agent.
    pub query: String,
}

/// A validated object schema for an agent's final output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    name: String,
    schema: Value,
}

impl OutputSchema {
    /// Wrap a raw JSON schema.
    ///
    /// The schema must describe an object with at least one property, and
    /// every `required` entry must name a declared property.
    pub fn new(name: impl Into<String>, schema: Value) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AgentsError::configuration("output schema name is empty"));
        }
        check_object_schema(&name, &schema)?;
        Ok(Self { name, schema })
    }

    /// Derive the schema of `T` via schemars.
    pub fn of<T: JsonSchema>() -> Result<Self> {
        let root = schemars::schema_for!(T);
        let schema = serde_json::to_value(root)?;
        Self::new(T::schema_name(), schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Check a candidate output against required fields and primitive types.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let obj = value.as_object().ok_or_else(|| {
            AgentsError::model_behavior(format!("{} output is not a JSON object", self.name))
        })?;

        for field in required_fields(&self.schema) {
            if !obj.contains_key(field) {
                return Err(AgentsError::model_behavior(format!(
                    "{} output is missing required field '{}'",
                    self.name, field
                )));
            }
        }

        if let Some(props) = self.schema.get("properties").and_then(Value::as_object) {
            for (key, prop) in props {
                let (Some(actual), Some(expected)) =
                    (obj.get(key), prop.get("type").and_then(Value::as_str))
                else {
                    continue;
                };
                if !type_matches(expected, actual) {
                    return Err(AgentsError::model_behavior(format!(
                        "{} field '{}' should be of type {}",
                        self.name, key, expected
                    )));
                }
            }
        }
        Ok(())
    }

    /// Parse the model's final text as JSON and validate it.
    pub fn parse_output(&self, text: &str) -> Result<Value> {
        let body = strip_code_fence(text);
        let value: Value = serde_json::from_str(body).map_err(|e| {
            AgentsError::model_behavior(format!(
                "{} output is not valid JSON: {}",
                self.name, e
            ))
        })?;
        self.validate(&value)?;
        Ok(value)
    }
}

fn check_object_schema(name: &str, schema: &Value) -> Result<()> {
    let malformed = |reason: &str| {
        AgentsError::configuration(format!("malformed output schema '{}': {}", name, reason))
    };

    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return Err(malformed("top-level type must be \"object\""));
    }
    let props = schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing \"properties\""))?;
    if props.is_empty() {
        return Err(malformed("no properties declared"));
    }
    if let Some(required) = schema.get("required") {
        let list = required
            .as_array()
            .ok_or_else(|| malformed("\"required\" must be an array"))?;
        for entry in list {
            let field = entry
                .as_str()
                .ok_or_else(|| malformed("\"required\" entries must be strings"))?;
            if !props.contains_key(field) {
                return Err(malformed(&format!(
                    "required field '{}' is not a declared property",
                    field
                )));
            }
        }
    }
    Ok(())
}

fn required_fields(schema: &Value) -> impl Iterator<Item = &str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn type_matches(expected: &str, actual: &Value) -> bool {
    match expected {
        "string" => actual.is_string(),
        "number" => actual.is_number(),
        "integer" => actual.is_i64() || actual.is_u64(),
        "boolean" => actual.is_boolean(),
        "object" => actual.is_object(),
        "array" => actual.is_array(),
        "null" => actual.is_null(),
        _ => true,
    }
}

// Models occasionally wrap JSON answers in a markdown fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_final_result_schema() {
        let schema = OutputSchema::of::<FinalResult>().unwrap();
        assert_eq!(schema.name(), "FinalResult");
        assert_eq!(schema.schema()["properties"]["query"]["type"], "string");
        assert_eq!(schema.schema()["required"], json!(["query"]));
    }

    #[test]
    fn test_malformed_schemas_rejected() {
        let not_object = OutputSchema::new("X", json!({"type": "string"}));
        assert!(matches!(not_object, Err(AgentsError::Configuration { .. })));

        let no_props = OutputSchema::new("X", json!({"type": "object", "properties": {}}));
        assert!(no_props.is_err());

        let dangling_required = OutputSchema::new(
            "X",
            json!({"type": "object", "properties": {"a": {"type": "string"}}, "required": ["b"]}),
        );
        assert!(dangling_required.is_err());

        let unnamed = OutputSchema::new(" ", json!({"type": "object", "properties": {"a": {}}}));
        assert!(unnamed.is_err());
    }

    #[test]
    fn test_parse_output() {
        let schema = OutputSchema::of::<FinalResult>().unwrap();

        let ok = schema.parse_output(r#"{"query": "What ETFs do you recommend?"}"#);
        assert_eq!(ok.unwrap()["query"], "What ETFs do you recommend?");

        let fenced = schema.parse_output("```json\n{\"query\": \"hi\"}\n```");
        assert_eq!(fenced.unwrap()["query"], "hi");

        let missing = schema.parse_output(r#"{"answer": "x"}"#);
        assert!(matches!(missing, Err(AgentsError::ModelBehavior { .. })));

        let wrong_type = schema.parse_output(r#"{"query": 3}"#);
        assert!(wrong_type.is_err());

        let prose = schema.parse_output("I routed your query.");
        assert!(prose.is_err());
    }
}
