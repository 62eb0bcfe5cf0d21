//! # Lifecycle hooks
//!
//! Each agent may carry one observer that receives a [`LifecycleEvent`] for
//! everything happening on its behalf: its own start and end, every model
//! call it makes, every tool it invokes, and handoffs into it.
//!
//! Observers are diagnostics only. [`notify`] delivers an event and swallows
//! any failure with a warning, so a broken sink never fails a user request.
//!
//! ```rust
//! use concierge_agents::hooks::{AgentHooks, ConsoleHooks, LifecycleEvent};
//! use concierge_agents::usage::Usage;
//!
//! # tokio_test_block_on(async {
//! let hooks = ConsoleHooks::with_writer("Trade Agent", Vec::new());
//! hooks
//!     .handle(&LifecycleEvent::AgentStart {
//!         agent: "Trade Agent".into(),
//!         usage: Usage::empty(),
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(hooks.event_count(), 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

use async_trait::async_trait;
use colored::Colorize;
use serde_json::Value;
use std::io::{Stdout, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

use crate::error::{AgentsError, Result};
use crate::usage::Usage;

/// Something that happened during a run, as seen by one agent.
///
/// `agent` is always the agent whose observer receives the event. For
/// `Handoff` that is the receiving agent; `from` names the source.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    AgentStart {
        agent: String,
        usage: Usage,
    },
    AgentEnd {
        agent: String,
        output: Option<Value>,
        usage: Usage,
    },
    LlmStart {
        agent: String,
        usage: Usage,
    },
    LlmEnd {
        agent: String,
        response: Option<String>,
        usage: Usage,
    },
    ToolStart {
        agent: String,
        tool: String,
        usage: Usage,
    },
    ToolEnd {
        agent: String,
        tool: String,
        result: String,
        usage: Usage,
    },
    Handoff {
        agent: String,
        from: String,
        usage: Usage,
    },
}

impl LifecycleEvent {
    pub fn agent(&self) -> &str {
        match self {
            LifecycleEvent::AgentStart { agent, .. }
            | LifecycleEvent::AgentEnd { agent, .. }
            | LifecycleEvent::LlmStart { agent, .. }
            | LifecycleEvent::LlmEnd { agent, .. }
            | LifecycleEvent::ToolStart { agent, .. }
            | LifecycleEvent::ToolEnd { agent, .. }
            | LifecycleEvent::Handoff { agent, .. } => agent,
        }
    }

    /// Cumulative usage at the moment the event fired.
    pub fn usage(&self) -> Usage {
        match self {
            LifecycleEvent::AgentStart { usage, .. }
            | LifecycleEvent::AgentEnd { usage, .. }
            | LifecycleEvent::LlmStart { usage, .. }
            | LifecycleEvent::LlmEnd { usage, .. }
            | LifecycleEvent::ToolStart { usage, .. }
            | LifecycleEvent::ToolEnd { usage, .. }
            | LifecycleEvent::Handoff { usage, .. } => *usage,
        }
    }

    /// Short snake_case name, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::AgentStart { .. } => "agent_start",
            LifecycleEvent::AgentEnd { .. } => "agent_end",
            LifecycleEvent::LlmStart { .. } => "llm_start",
            LifecycleEvent::LlmEnd { .. } => "llm_end",
            LifecycleEvent::ToolStart { .. } => "tool_start",
            LifecycleEvent::ToolEnd { .. } => "tool_end",
            LifecycleEvent::Handoff { .. } => "handoff",
        }
    }
}

/// Observer for one agent's lifecycle events.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    async fn handle(&self, event: &LifecycleEvent) -> Result<()>;
}

/// Deliver an event, logging and discarding any observer failure.
pub async fn notify(hooks: Option<&Arc<dyn AgentHooks>>, event: LifecycleEvent) {
    let Some(hooks) = hooks else {
        return;
    };
    if let Err(e) = hooks.handle(&event).await {
        warn!(agent = %event.agent(), event = event.kind(), error = %e, "lifecycle hook failed");
    }
}

/// Colour-coded console observer, one per persona.
pub struct ConsoleHooks<W = Stdout> {
    display_name: String,
    event_counter: AtomicUsize,
    sink: Mutex<W>,
}

impl ConsoleHooks<Stdout> {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self::with_writer(display_name, std::io::stdout())
    }
}

impl<W: Write> ConsoleHooks<W> {
    pub fn with_writer(display_name: impl Into<String>, sink: W) -> Self {
        Self {
            display_name: display_name.into(),
            event_counter: AtomicUsize::new(0),
            sink: Mutex::new(sink),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Events handled by this instance so far.
    pub fn event_count(&self) -> usize {
        self.event_counter.load(Ordering::SeqCst)
    }

    pub fn into_inner(self) -> W {
        self.sink.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn render(&self, n: usize, event: &LifecycleEvent) -> String {
        let who = &self.display_name;
        let line = match event {
            LifecycleEvent::AgentStart { agent, usage } => {
                format!("### ({who}) {n}: Agent {agent} started. Usage: {usage}")
            }
            LifecycleEvent::AgentEnd {
                agent,
                output,
                usage,
            } => {
                let output = output
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_else(|| "<none>".to_string());
                format!("### ({who}) {n}: Agent {agent} ended with output {output}. Usage: {usage}")
            }
            LifecycleEvent::LlmStart { usage, .. } => {
                format!("### ({who}) {n}: LLM started. Usage: {usage}")
            }
            LifecycleEvent::LlmEnd { usage, .. } => {
                format!("### ({who}) {n}: LLM ended. Usage: {usage}")
            }
            LifecycleEvent::ToolStart { agent, tool, .. } => {
                format!("### ({who}) {n}: Agent {agent} started tool {tool}")
            }
            LifecycleEvent::ToolEnd {
                agent,
                tool,
                result,
                ..
            } => format!("### ({who}) {n}: Agent {agent} ended tool {tool} with result {result}"),
            LifecycleEvent::Handoff { agent, from, .. } => {
                format!("### ({who}) {n}: Agent {from} handed off to {agent}")
            }
        };

        let coloured = match event {
            LifecycleEvent::AgentStart { .. } => line.magenta(),
            LifecycleEvent::AgentEnd { .. } => line.cyan(),
            LifecycleEvent::LlmStart { .. } | LifecycleEvent::Handoff { .. } => line.red(),
            LifecycleEvent::LlmEnd { .. } | LifecycleEvent::ToolEnd { .. } => line.yellow(),
            LifecycleEvent::ToolStart { .. } => line.green(),
        };
        coloured.to_string()
    }
}

#[async_trait]
impl<W: Write + Send> AgentHooks for ConsoleHooks<W> {
    async fn handle(&self, event: &LifecycleEvent) -> Result<()> {
        let n = self.event_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let line = self.render(n, event);
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| AgentsError::Hook {
                message: format!("{} console sink poisoned", self.display_name),
            })?;
        writeln!(sink, "{}", line).map_err(|e| AgentsError::Hook {
            message: e.to_string(),
        })?;
        sink.flush().map_err(|e| AgentsError::Hook {
            message: e.to_string(),
        })
    }
}

/// Observer that keeps every event in memory.
#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(LifecycleEvent::kind).collect()
    }
}

#[async_trait]
impl AgentHooks for RecordingHooks {
    async fn handle(&self, event: &LifecycleEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
