//! Query dispatch through the concierge.
//!
//! The [`Dispatcher`] owns a routing clone of the concierge whose tool set is
//! replaced by the specialist adapters, and which may run at most one of them
//! per query. Which specialist handles a query is decided by the model;
//! nothing here inspects the text beyond rejecting empty input.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::agent_tool::AgentTool;
use crate::context::RunContext;
use crate::error::{AgentsError, Result};
use crate::roster::routing_prompt;
use crate::runner::Runner;
use crate::schema::FinalResult;
use crate::tool::Tool;

/// Routes one user query to a specialist and returns its structured answer.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn select_and_run(&self, query: &str) -> Result<FinalResult>;
}

pub struct Dispatcher {
    router: Agent,
    ctx: RunContext,
}

impl Dispatcher {
    pub fn new(concierge: &Agent, specialists: Vec<AgentTool>, ctx: RunContext) -> Result<Self> {
        let mut agent_names = HashSet::new();
        for adapter in &specialists {
            if !agent_names.insert(adapter.agent().name()) {
                return Err(AgentsError::configuration(format!(
                    "duplicate agent name '{}' in roster",
                    adapter.agent().name()
                )));
            }
        }

        let tools: Vec<Arc<dyn Tool>> = specialists
            .into_iter()
            .map(|adapter| Arc::new(adapter) as Arc<dyn Tool>)
            .collect();

        let mut tool_names = HashSet::new();
        for tool in &tools {
            if !tool_names.insert(tool.name()) {
                return Err(AgentsError::configuration(format!(
                    "duplicate tool name '{}' in dispatcher tool set",
                    tool.name()
                )));
            }
        }

        let router = concierge.clone_with_tools(tools)?.with_agent_tool_limit(1);
        debug!(router = %router.name(), tools = router.tools().len(), "dispatcher ready");
        Ok(Self { router, ctx })
    }

    /// The routing clone of the concierge.
    pub fn router(&self) -> &Agent {
        &self.router
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }
}

#[async_trait]
impl Dispatch for Dispatcher {
    async fn select_and_run(&self, query: &str) -> Result<FinalResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentsError::validation("query is empty"));
        }

        info!(%query, "dispatching query");
        let result = Runner::run(&self.router, routing_prompt(query), self.ctx.clone()).await?;
        debug!(usage = %result.usage, last_agent = %result.last_agent, "dispatch finished");
        into_final_result(result.final_output)
    }
}

fn into_final_result(output: Value) -> Result<FinalResult> {
    let value = match output {
        Value::String(text) => serde_json::from_str(&text).map_err(|e| {
            AgentsError::model_behavior(format!("final output is not a FinalResult: {}", e))
        })?,
        other => other,
    };
    serde_json::from_value(value)
        .map_err(|e| AgentsError::model_behavior(format!("final output is not a FinalResult: {}", e)))
}
