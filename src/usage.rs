//! # Usage accounting
//!
//! Every provider call reports a [`Usage`]; the [`UsageStats`] held by the run
//! context folds them into a session-wide total and a per-agent breakdown.
//! Totals only ever grow, so any snapshot taken later in a session is at least
//! as large as an earlier one.
//!
//! ```rust
//! use concierge_agents::usage::{Usage, UsageStats};
//!
//! let mut stats = UsageStats::new();
//! stats.record("Concierge Agent", Usage::new(120, 30));
//! stats.record("Product Agent", Usage::new(80, 20));
//!
//! assert_eq!(stats.total.requests, 2);
//! assert_eq!(stats.total.total_tokens, 250);
//! assert_eq!(
//!     stats.total.to_string(),
//!     "2 requests, 200 input tokens, 50 output tokens, 250 total tokens"
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;

/// Token and request counters, either for one call or accumulated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    /// Number of model requests.
    pub requests: usize,

    /// Tokens sent to the model.
    pub input_tokens: usize,

    /// Tokens generated by the model.
    pub output_tokens: usize,

    /// `input_tokens + output_tokens`.
    pub total_tokens: usize,
}

impl Usage {
    /// Usage of a single request.
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            requests: 1,
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn add_usage(&mut self, other: &Usage) {
        self.requests += other.requests;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self.add_usage(&other);
        self
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests, {} input tokens, {} output tokens, {} total tokens",
            self.requests, self.input_tokens, self.output_tokens, self.total_tokens
        )
    }
}

/// Session total plus a breakdown by agent name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub total: Usage,
    pub by_agent: BTreeMap<String, Usage>,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, agent: &str, usage: Usage) {
        self.total.add_usage(&usage);
        self.by_agent
            .entry(agent.to_string())
            .and_modify(|u| u.add_usage(&usage))
            .or_insert(usage);
    }

    /// Human-readable report, one line per agent.
    pub fn summary(&self) -> String {
        let mut report = format!("Usage: {}\n", self.total);
        for (agent, usage) in &self.by_agent {
            report.push_str(&format!("  {}: {}\n", agent, usage));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_usage_creation() {
        let usage = Usage::new(100, 50);
        assert_eq!(usage.input_tokens, 100);
        assert_eq!(usage.output_tokens, 50);
        assert_eq!(usage.total_tokens, 150);
        assert_eq!(usage.requests, 1);
    }

    #[test]
    fn test_usage_add_operator() {
        let combined = Usage::new(100, 50) + Usage::new(200, 100);
        assert_eq!(combined, Usage {
            requests: 2,
            input_tokens: 300,
            output_tokens: 150,
            total_tokens: 450,
        });
    }

    #[test]
    fn test_empty_usage_display() {
        assert_eq!(
            Usage::empty().to_string(),
            "0 requests, 0 input tokens, 0 output tokens, 0 total tokens"
        );
    }

    #[test]
    fn test_usage_stats_by_agent() {
        let mut stats = UsageStats::new();
        stats.record("Concierge Agent", Usage::new(100, 50));
        stats.record("Trade Agent", Usage::new(10, 5));
        stats.record("Concierge Agent", Usage::new(100, 50));

        assert_eq!(stats.total.requests, 3);
        assert_eq!(stats.by_agent.len(), 2);
        assert_eq!(stats.by_agent["Concierge Agent"].total_tokens, 300);

        let summary = stats.summary();
        assert!(summary.contains("Trade Agent: 1 requests"));
    }

    #[test]
    fn test_totals_never_decrease() {
        let mut stats = UsageStats::new();
        let mut previous = stats.total;
        for i in 0..5 {
            stats.record("Agent", Usage::new(i, i * 2));
            assert!(stats.total.requests > previous.requests);
            assert!(stats.total.total_tokens >= previous.total_tokens);
            previous = stats.total;
        }
    }
}
