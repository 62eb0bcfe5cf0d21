//! # Agent handoffs
//!
//! A handoff lets one agent transfer the rest of the conversation to another.
//! The model sees each handoff as an ordinary function named
//! `transfer_to_<agent_name>`; when it calls one, the run loop switches the
//! active agent instead of executing anything.
//!
//! ```rust
//! use std::sync::Arc;
//! use concierge_agents::agent::Agent;
//! use concierge_agents::handoff::Handoff;
//!
//! let trade = Agent::builder("Trade Agent", "Handles trades.")
//!     .with_handoff_description("Trade Agent for account and trade inquiries")
//!     .build()
//!     .unwrap();
//!
//! let handoff = Handoff::new(Arc::new(trade));
//! assert_eq!(handoff.tool_name(), "transfer_to_trade_agent");
//! assert!(handoff.description().contains("account and trade inquiries"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::agent::Agent;
use crate::tool::ToolSpec;

/// A potential handoff target.
#[derive(Clone)]
pub struct Handoff {
    tool_name: String,
    description: String,
    agent: Arc<Agent>,
}

impl Handoff {
    /// Handoff advertised under the default `transfer_to_<agent>` name.
    pub fn new(agent: Arc<Agent>) -> Self {
        let mut description = format!(
            "Handoff to the {} agent to handle the request.",
            agent.name()
        );
        if let Some(extra) = agent.handoff_description() {
            description.push(' ');
            description.push_str(extra);
        }
        Self {
            tool_name: default_tool_name(agent.name()),
            description,
            agent,
        }
    }

    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.tool_name.clone(),
            description: self.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Reason for handoff"}
                }
            }),
        }
    }
}

impl std::fmt::Debug for Handoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handoff")
            .field("tool_name", &self.tool_name)
            .field("target", &self.agent.name())
            .finish()
    }
}

/// `"Trade Agent"` becomes `transfer_to_trade_agent`.
pub fn default_tool_name(agent_name: &str) -> String {
    let mut snake = String::with_capacity(agent_name.len());
    for c in agent_name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            snake.push(c.to_ascii_lowercase());
        } else if !snake.ends_with('_') {
            snake.push('_');
        }
    }
    format!("transfer_to_{}", snake.trim_end_matches('_'))
}

/// What travels with a handoff: who sent it, who receives it, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffData {
    pub from_agent: String,
    pub to_agent: String,
    pub reason: Option<String>,
}

impl HandoffData {
    /// Build from the arguments the model passed to the handoff function.
    pub fn from_arguments(from: &str, to: &str, arguments: &Value) -> Self {
        Self {
            from_agent: from.to_string(),
            to_agent: to.to_string(),
            reason: arguments
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str) -> Arc<Agent> {
        Arc::new(Agent::builder(name, "instructions").build().unwrap())
    }

    #[test]
    fn test_default_tool_names() {
        assert_eq!(default_tool_name("Trade Agent"), "transfer_to_trade_agent");
        assert_eq!(default_tool_name("Escalation  Agent!"), "transfer_to_escalation_agent");
        assert_eq!(default_tool_name("kyc-check"), "transfer_to_kyc_check");
    }

    #[test]
    fn test_custom_name_and_description() {
        let handoff = Handoff::new(agent("Compliance Agent"))
            .with_tool_name("escalate_compliance")
            .with_description("Regulatory questions");

        assert_eq!(handoff.tool_name(), "escalate_compliance");
        assert_eq!(handoff.spec().description, "Regulatory questions");
        assert_eq!(handoff.agent().name(), "Compliance Agent");
    }

    #[test]
    fn test_handoff_data_reason() {
        let data = HandoffData::from_arguments(
            "Concierge Agent",
            "Trade Agent",
            &serde_json::json!({"reason": "account balance"}),
        );
        assert_eq!(data.reason.as_deref(), Some("account balance"));

        let bare = HandoffData::from_arguments("A", "B", &Value::Null);
        assert_eq!(bare.reason, None);
    }

    #[test]
    fn test_debug_hides_agent_body() {
        let debug_str = format!("{:?}", Handoff::new(agent("Product Agent")));
        assert!(debug_str.contains("transfer_to_product_agent"));
        assert!(!debug_str.contains("instructions"));
    }
}
