//! Tool system for agents
//!
//! Tools are how an agent acts during a run: plain functions
//! ([`FunctionTool`]) or whole agents wrapped as tools
//! ([`crate::agent_tool::AgentTool`]). Both sit behind the same [`Tool`] trait
//! so the run loop routes to them uniformly by name.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

use crate::context::RunContext;
use crate::error::Result;

/// Result from a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The output from the tool
    pub output: Value,
    /// Error message if the tool failed; reported back to the model
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self {
            output,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: Value::Null,
            error: Some(message.into()),
        }
    }

    /// Text handed back to the model as the tool message.
    pub fn to_content(&self) -> String {
        match (&self.error, &self.output) {
            (Some(err), _) => format!("Error: {}", err),
            (None, Value::String(s)) => s.clone(),
            (None, other) => other.to_string(),
        }
    }
}

/// Function signature advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Trait for all tools that can be used by agents
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments
    fn parameters_schema(&self) -> Value;

    /// Execute the tool within the current run.
    async fn execute(&self, ctx: &RunContext, arguments: Value) -> Result<ToolResult>;

    /// True when executing the tool runs another agent.
    fn delegates_to_agent(&self) -> bool {
        false
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

type ToolFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// A function-based tool
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters_schema: Value,
    function: ToolFn,
}

impl Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

impl FunctionTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        function: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            function: Arc::new(function),
        }
    }

    /// Create a tool from a typed handler; the schema is derived from `A`.
    pub fn typed<A, R, F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + JsonSchema,
        R: Serialize,
        F: Fn(A) -> Result<R> + Send + Sync + 'static,
    {
        let schema = serde_json::to_value(schemars::schema_for!(A).schema)
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}));
        Self::new(name, description, schema, move |raw: Value| {
            let args: A = serde_json::from_value(raw)?;
            let out = handler(args)?;
            Ok(serde_json::to_value(out)?)
        })
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn execute(&self, _ctx: &RunContext, arguments: Value) -> Result<ToolResult> {
        match (self.function)(arguments) {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentsError;
    use crate::model::ScriptedProvider;
    use pretty_assertions::assert_eq;

    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        text: String,
    }

    fn ctx() -> RunContext {
        RunContext::new(Arc::new(ScriptedProvider::new("scripted")))
    }

    #[test]
    fn test_tool_result_content() {
        assert_eq!(ToolResult::success(Value::String("plain".into())).to_content(), "plain");
        assert_eq!(
            ToolResult::success(serde_json::json!({"query": "q"})).to_content(),
            r#"{"query":"q"}"#
        );
        assert_eq!(ToolResult::error("boom").to_content(), "Error: boom");
    }

    #[tokio::test]
    async fn test_typed_tool_execution() {
        let tool = FunctionTool::typed("shout", "Uppercases text", |args: EchoArgs| {
            Ok(args.text.to_uppercase())
        });

        let spec = tool.spec();
        assert_eq!(spec.name, "shout");
        assert_eq!(spec.parameters["properties"]["text"]["type"], "string");

        let result = tool
            .execute(&ctx(), serde_json::json!({"text": "etf"}))
            .await
            .unwrap();
        assert_eq!(result.output, Value::String("ETF".into()));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_bad_arguments_become_tool_errors() {
        let tool = FunctionTool::typed("shout", "Uppercases text", |args: EchoArgs| {
            Ok(args.text)
        });
        let result = tool
            .execute(&ctx(), serde_json::json!({"wrong": 1}))
            .await
            .unwrap();
        assert!(result.error.unwrap().contains("Serialization error"));
    }

    #[tokio::test]
    async fn test_function_tool_error_handling() {
        let tool = FunctionTool::new("failing", "Always fails", serde_json::json!({}), |_| {
            Err(AgentsError::tool_execution("Intentional failure"))
        });
        let result = tool.execute(&ctx(), serde_json::json!({})).await.unwrap();
        assert!(result.error.unwrap().contains("Intentional failure"));
    }
}
