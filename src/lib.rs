//! # Concierge agents
//!
//! A multi-agent investment bank support desk. Five specialist personas
//! (trade, product, compliance, escalation, knowledge) are exposed as tools to
//! a concierge agent, and the concierge routes every user query to exactly one
//! of them. The routing decision is a model inference; this crate supplies the
//! engine around it.
//!
//! ## Core Concepts
//!
//! - **Agent**: an immutable persona descriptor ([`agent::Agent`])
//! - **Tools**: functions or whole agents the model may call ([`tool::Tool`], [`agent_tool::AgentTool`])
//! - **Runner**: the turn loop that calls the model and executes tools ([`runner::Runner`])
//! - **Hooks**: per-agent lifecycle observers ([`hooks::AgentHooks`])
//! - **Dispatcher**: the routing concierge behind [`dispatcher::Dispatch`]
//!
//! ## Getting Started
//!
//! ```rust
//! use std::sync::Arc;
//! use concierge_agents::{Dispatch, Dispatcher, RecordingHooks, Roster, RunContext, ScriptedProvider};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> concierge_agents::Result<()> {
//! let provider = ScriptedProvider::new("scripted")
//!     .with_tool_call("product_tool", serde_json::json!({"input": "What ETFs do you recommend?"}))
//!     .with_message(r#"{"query": "What ETFs do you recommend?"}"#)
//!     .with_message(r#"{"query": "What ETFs do you recommend?"}"#);
//!
//! let roster = Roster::with_hooks(|_| Arc::new(RecordingHooks::new()))?;
//! let ctx = RunContext::new(Arc::new(provider));
//! let dispatcher = Dispatcher::new(&roster.concierge, roster.specialists, ctx)?;
//!
//! let result = dispatcher.select_and_run("What ETFs do you recommend?").await?;
//! assert_eq!(result.query, "What ETFs do you recommend?");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agent_tool;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handoff;
pub mod hooks;
pub mod items;
pub mod model;
pub mod repl;
pub mod retry;
pub mod roster;
pub mod runner;
pub mod schema;
pub mod service;
pub mod tool;
pub mod usage;

pub use agent::{Agent, AgentBuilder, AgentConfig};
pub use agent_tool::AgentTool;
pub use config::{AppConfig, RetryConfig};
pub use context::RunContext;
pub use dispatcher::{Dispatch, Dispatcher};
pub use error::{AgentsError, Result};
pub use handoff::Handoff;
pub use hooks::{AgentHooks, ConsoleHooks, LifecycleEvent, RecordingHooks};
pub use model::{ModelProvider, ModelRequest, OpenAIProvider, ScriptedProvider};
pub use repl::Repl;
pub use retry::RetryingProvider;
pub use roster::Roster;
pub use runner::{RunResult, Runner};
pub use schema::{FinalResult, OutputSchema};
pub use tool::{FunctionTool, Tool, ToolResult};
pub use usage::{Usage, UsageStats};
