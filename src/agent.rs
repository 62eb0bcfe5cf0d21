//! # Agent (orientation)
//!
//! An [`Agent`] is an immutable persona descriptor: a unique name,
//! instructions, an ordered tool list, optional handoff targets, an optional
//! structured output schema and an optional lifecycle observer. Descriptors are
//! validated once, at construction, and never mutated afterwards. To give an
//! agent a different tool set, derive a new descriptor with
//! [`Agent::clone_with_tools`].

use std::collections::HashSet;
use std::sync::Arc;

use crate::agent_tool::AgentTool;
use crate::error::{AgentsError, Result};
use crate::handoff::Handoff;
use crate::hooks::AgentHooks;
use crate::items::Message;
use crate::schema::OutputSchema;
use crate::tool::Tool;

/// Complete configuration for an [`Agent`].
#[derive(Clone, Default)]
pub struct AgentConfig {
    /// Unique name; the routing key for tools, handoffs and logs.
    pub name: String,

    /// System instructions that define the persona.
    pub instructions: String,

    /// What this agent is good at, shown to agents that can hand off to it.
    pub handoff_description: Option<String>,

    /// Tools the agent may call, in the order they are advertised.
    pub tools: Vec<Arc<dyn Tool>>,

    /// Agents this agent may transfer the conversation to.
    pub handoffs: Vec<Handoff>,

    /// Shape of the final answer, when structured output is required.
    pub output_schema: Option<OutputSchema>,

    /// Model override; the provider's default is used when `None`.
    pub model: Option<String>,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,

    /// Cap on agent-backed tool calls per run; `None` is unlimited. Calls
    /// past the cap are answered with a tool error instead of being run.
    pub max_agent_tool_calls: Option<usize>,

    /// Observer receiving this agent's lifecycle events.
    pub hooks: Option<Arc<dyn AgentHooks>>,
}

/// An immutable, validated agent descriptor.
///
/// ```rust
/// use concierge_agents::agent::Agent;
/// use concierge_agents::schema::{FinalResult, OutputSchema};
///
/// let trade = Agent::builder("Trade Agent", "Handles trade and account inquiries.")
///     .with_output_schema(OutputSchema::of::<FinalResult>().unwrap())
///     .build()
///     .unwrap();
///
/// assert_eq!(trade.name(), "Trade Agent");
/// assert!(Agent::builder("  ", "nameless").build().is_err());
/// ```
#[derive(Clone)]
pub struct Agent {
    config: AgentConfig,
}

impl Agent {
    /// Validate a configuration and freeze it into an agent.
    pub fn new(config: AgentConfig) -> Result<Self> {
        if config.name.trim().is_empty() {
            return Err(AgentsError::configuration("agent name is empty"));
        }
        check_unique_tool_names(&config.name, &config.tools, &config.handoffs)?;
        Ok(Self { config })
    }

    pub fn builder(name: impl Into<String>, instructions: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            config: AgentConfig {
                name: name.into(),
                instructions: instructions.into(),
                ..AgentConfig::default()
            },
        }
    }

    /// A new descriptor identical to this one except for its tool list.
    ///
    /// The original is untouched, so specialists never learn about the
    /// routing tools given to a dispatcher clone.
    pub fn clone_with_tools(&self, tools: Vec<Arc<dyn Tool>>) -> Result<Agent> {
        Agent::new(AgentConfig {
            tools,
            ..self.config.clone()
        })
    }

    /// The same descriptor with a cap on agent-backed tool calls per run.
    pub fn with_agent_tool_limit(mut self, limit: usize) -> Agent {
        self.config.max_agent_tool_calls = Some(limit);
        self
    }

    /// Expose this agent as a tool another agent can call.
    pub fn as_tool(&self, name: impl Into<String>, description: impl Into<String>) -> AgentTool {
        AgentTool::new(Arc::new(self.clone()), name, description)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn instructions(&self) -> &str {
        &self.config.instructions
    }

    pub fn handoff_description(&self) -> Option<&str> {
        self.config.handoff_description.as_deref()
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.config.tools
    }

    pub fn handoffs(&self) -> &[Handoff] {
        &self.config.handoffs
    }

    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.config.output_schema.as_ref()
    }

    pub fn agent_tool_limit(&self) -> Option<usize> {
        self.config.max_agent_tool_calls
    }

    pub fn hooks(&self) -> Option<&Arc<dyn AgentHooks>> {
        self.config.hooks.as_ref()
    }

    pub fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.config.tools.iter().find(|t| t.name() == name)
    }

    pub fn find_handoff(&self, tool_name: &str) -> Option<&Handoff> {
        self.config
            .handoffs
            .iter()
            .find(|h| h.tool_name() == tool_name)
    }

    /// System prompt: instructions followed by the available tools and handoffs.
    pub fn build_system_message(&self) -> Message {
        let mut content = self.config.instructions.clone();

        if !self.config.tools.is_empty() {
            content.push_str("\n\nYou have access to the following tools:\n");
            for tool in &self.config.tools {
                content.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
            }
        }

        if !self.config.handoffs.is_empty() {
            content.push_str("\n\nYou can hand off to the following agents:\n");
            for handoff in &self.config.handoffs {
                content.push_str(&format!(
                    "- {}: {}\n",
                    handoff.tool_name(),
                    handoff.description()
                ));
            }
        }

        Message::system(content)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("model", &self.config.model)
            .field("tools_count", &self.config.tools.len())
            .field("handoffs_count", &self.config.handoffs.len())
            .field("structured", &self.config.output_schema.is_some())
            .finish()
    }
}

fn check_unique_tool_names(agent: &str, tools: &[Arc<dyn Tool>], handoffs: &[Handoff]) -> Result<()> {
    let mut seen = HashSet::new();
    let names = tools
        .iter()
        .map(|t| t.name())
        .chain(handoffs.iter().map(Handoff::tool_name));
    for name in names {
        if name.trim().is_empty() {
            return Err(AgentsError::configuration(format!(
                "agent '{}' has a tool with an empty name",
                agent
            )));
        }
        if !seen.insert(name) {
            return Err(AgentsError::configuration(format!(
                "agent '{}' has duplicate tool name '{}'",
                agent, name
            )));
        }
    }
    Ok(())
}

/// Fluent construction of an [`Agent`]; validation happens in [`build`](Self::build).
pub struct AgentBuilder {
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn with_handoff_description(mut self, description: impl Into<String>) -> Self {
        self.config.handoff_description = Some(description.into());
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.config.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.config.tools.extend(tools);
        self
    }

    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.config.handoffs.push(handoff);
        self
    }

    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.config.output_schema = Some(schema);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_agent_tool_limit(mut self, limit: usize) -> Self {
        self.config.max_agent_tool_calls = Some(limit);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn AgentHooks>) -> Self {
        self.config.hooks = Some(hooks);
        self
    }

    pub fn build(self) -> Result<Agent> {
        Agent::new(self.config)
    }
}
