//! The investment bank support desk: one concierge and five specialists.
//!
//! Every persona carries the `print_query` tool, returns a [`FinalResult`] and
//! reports lifecycle events to its own observer. Each specialist is exposed to
//! the concierge as a tool; the concierge is exposed too, as `concierge_tool`,
//! so the routing clone can reach the original concierge.

use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

use crate::agent::Agent;
use crate::agent_tool::AgentTool;
use crate::error::Result;
use crate::hooks::{AgentHooks, ConsoleHooks};
use crate::schema::{FinalResult, OutputSchema};
use crate::tool::{FunctionTool, Tool};

pub const RECOMMENDED_PROMPT_PREFIX: &str = "# System context\n\
You are part of a multi-agent system called the Agents SDK, designed to make agent \
coordination and execution easy. Agents uses two primary abstraction: **Agents** and \
**Handoffs**. An agent encompasses instructions and tools and can hand off a \
conversation to another agent when appropriate. \
Handoffs are achieved by calling a handoff function, generally named \
`transfer_to_<agent_name>`.\n";

/// Static description of one persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub name: &'static str,
    pub tool_name: &'static str,
    /// Shown to the concierge as the tool description and as the handoff description.
    pub description: &'static str,
    pub duty: &'static str,
}

impl Persona {
    pub fn instructions(&self) -> String {
        format!("{} {}. Prints the query", RECOMMENDED_PROMPT_PREFIX, self.duty)
    }
}

pub const CONCIERGE: Persona = Persona {
    name: "Concierge Agent",
    tool_name: "concierge_tool",
    description: "A helpful agent that can delegate a customer's request to the appropriate agent.",
    duty: "A concierge agent that can delegate a customer's request to the appropriate agent",
};

pub const SPECIALISTS: [Persona; 5] = [
    Persona {
        name: "Trade Agent",
        tool_name: "trade_tool",
        description: "A helpful agent that can handle trade and account inquiries.",
        duty: "Handles trade and account inquiries",
    },
    Persona {
        name: "Product Agent",
        tool_name: "product_tool",
        description: "A helpful agent that can explain investment products (ETFs, derivatives, structured notes).",
        duty: "Explains investment products (ETFs, derivatives, structured notes)",
    },
    Persona {
        name: "Compliance Agent",
        tool_name: "compliance_tool",
        description: "A helpful agent that can ensure responses are compliant with regulations.",
        duty: "Ensures responses are compliant with regulations",
    },
    Persona {
        name: "Escalation Agent",
        tool_name: "escalation_tool",
        description: "A helpful agent that can handle escalations to a human advisor.",
        duty: "Handles escalations to a human advisor",
    },
    Persona {
        name: "Knowledge Agent",
        tool_name: "knowledge_tool",
        description: "A helpful agent that can log queries for insights and analysis.",
        duty: "Logs queries for insights and analysis",
    },
];

/// Input sent to the routing concierge for one user query.
pub fn routing_prompt(query: &str) -> String {
    format!(
        "{} Route the {} to the correct agent.",
        RECOMMENDED_PROMPT_PREFIX, query
    )
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryArgs {
    /// The customer's query
    pub query: String,
}

/// `print_query`: prints `[Query: ...]` and echoes the query back.
pub fn print_query_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::typed(
        "print_query",
        "Prints the query",
        |args: QueryArgs| {
            println!("[Query: {}]", args.query);
            Ok(args.query)
        },
    ))
}

/// Build one persona's agent with the given observer.
pub fn build_persona(persona: &Persona, hooks: Arc<dyn AgentHooks>) -> Result<Agent> {
    Agent::builder(persona.name, persona.instructions())
        .with_handoff_description(persona.description)
        .with_tool(print_query_tool())
        .with_output_schema(OutputSchema::of::<FinalResult>()?)
        .with_hooks(hooks)
        .build()
}

/// The assembled desk.
#[derive(Debug)]
pub struct Roster {
    pub concierge: Agent,
    /// `concierge_tool` first, then the five specialists in declaration order.
    pub specialists: Vec<AgentTool>,
}

impl Roster {
    /// Personas wired to colour-coded console observers.
    pub fn new() -> Result<Self> {
        Self::with_hooks(|name| Arc::new(ConsoleHooks::new(name)))
    }

    /// Personas wired to observers produced by `hooks_for(persona name)`.
    pub fn with_hooks<F>(mut hooks_for: F) -> Result<Self>
    where
        F: FnMut(&str) -> Arc<dyn AgentHooks>,
    {
        let concierge = build_persona(&CONCIERGE, hooks_for(CONCIERGE.name))?;

        let mut specialists = Vec::with_capacity(SPECIALISTS.len() + 1);
        specialists.push(concierge.as_tool(CONCIERGE.tool_name, CONCIERGE.description));
        for persona in &SPECIALISTS {
            let agent = build_persona(persona, hooks_for(persona.name))?;
            specialists.push(agent.as_tool(persona.tool_name, persona.description));
        }

        Ok(Self {
            concierge,
            specialists,
        })
    }
}
