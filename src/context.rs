//! Run context shared by an agent run and every run nested inside it.
//!
//! When the concierge invokes a specialist through an
//! [`AgentTool`](crate::agent_tool::AgentTool), the specialist runs with a
//! clone of the same context: same provider, same usage accumulator. Usage
//! snapshots therefore keep growing across the whole session.

use std::sync::{Arc, Mutex, PoisonError};

use crate::model::ModelProvider;
use crate::usage::{Usage, UsageStats};

/// Default turn limit when none is configured.
pub const DEFAULT_MAX_TURNS: usize = 10;

#[derive(Clone)]
pub struct RunContext {
    provider: Arc<dyn ModelProvider>,
    usage: Arc<Mutex<UsageStats>>,
    max_turns: usize,
}

impl RunContext {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            usage: Arc::new(Mutex::new(UsageStats::new())),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Fold one provider call into the session totals.
    pub fn record_usage(&self, agent: &str, usage: Usage) {
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(agent, usage);
    }

    /// Cumulative usage so far.
    pub fn usage(&self) -> Usage {
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total
    }

    pub fn usage_stats(&self) -> UsageStats {
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("model", &self.provider.model_name())
            .field("max_turns", &self.max_turns)
            .field("usage", &self.usage())
            .finish()
    }
}
