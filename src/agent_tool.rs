//! An agent exposed as a tool.
//!
//! The calling agent passes one `input` string; the wrapped agent runs to
//! completion on the same [`RunContext`] and its final output becomes the tool
//! result, unmodified.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::agent::Agent;
use crate::context::RunContext;
use crate::error::Result;
use crate::runner::Runner;
use crate::tool::{Tool, ToolResult};

#[derive(Clone)]
pub struct AgentTool {
    agent: Arc<Agent>,
    name: String,
    description: String,
}

impl AgentTool {
    pub fn new(agent: Arc<Agent>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            agent,
            name: name.into(),
            description: description.into(),
        }
    }

    /// The wrapped agent.
    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("agent", &self.agent.name())
            .finish()
    }
}

fn input_of(arguments: &Value) -> Option<&str> {
    match arguments {
        Value::String(s) => Some(s),
        other => other.get("input").and_then(Value::as_str),
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": {"type": "string", "description": "The request to hand to the agent"}
            },
            "required": ["input"],
            "additionalProperties": false
        })
    }

    fn delegates_to_agent(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &RunContext, arguments: Value) -> Result<ToolResult> {
        let Some(input) = input_of(&arguments) else {
            return Ok(ToolResult::error(format!(
                "{} expects a string argument 'input'",
                self.name
            )));
        };

        debug!(tool = %self.name, agent = %self.agent.name(), "running agent as tool");
        let result = Runner::run(&self.agent, input, ctx.clone()).await?;
        Ok(ToolResult::success(result.final_output))
    }
}
