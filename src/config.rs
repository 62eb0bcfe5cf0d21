//! Configuration for the concierge desk
//!
//! Loaded once at startup (environment or TOML file) and passed explicitly to
//! whatever needs it. Nothing reads the environment after that.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AgentsError, Result};

/// Placeholder shipped in templates; treated the same as a missing key.
pub const API_KEY_PLACEHOLDER: &str = "<ADD-OPENAI-API-KEY>";

/// Application configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// OpenAI API key
    pub api_key: String,

    /// Default model for every agent
    pub model: String,

    /// Optional API base URL (proxies, compatible servers)
    pub base_url: Option<String>,

    /// Turn limit for a single agent run
    pub max_turns: usize,

    /// Retry behaviour for transient provider failures
    pub retry: RetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            max_turns: 10,
            retry: RetryConfig::default(),
        }
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_turns", &self.max_turns)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: usize,

    /// Initial retry delay
    #[serde(with = "millis")]
    pub initial_delay: Duration,

    /// Maximum retry delay
    #[serde(with = "millis")]
    pub max_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Reject backoff settings that would shrink delays or panic when scaled.
    pub fn validate(&self) -> Result<()> {
        let multiplier = self.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(AgentsError::configuration(format!(
                "retry.backoff_multiplier must be a finite number >= 1.0, got {}",
                multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(AgentsError::configuration(format!(
                "retry.initial_delay ({:?}) exceeds retry.max_delay ({:?})",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Recognised keys: `OPENAI_API_KEY` (required), `OPENAI_MODEL`,
    /// `OPENAI_BASE_URL`, `AGENTS_MAX_TURNS`, `AGENTS_MAX_RETRIES`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig {
            api_key: lookup("OPENAI_API_KEY").unwrap_or_default(),
            ..AppConfig::default()
        };

        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(base) = lookup("OPENAI_BASE_URL").filter(|b| !b.trim().is_empty()) {
            config.base_url = Some(base);
        }
        if let Some(turns) = lookup("AGENTS_MAX_TURNS") {
            config.max_turns = parse_number("AGENTS_MAX_TURNS", &turns)?;
        }
        if let Some(retries) = lookup("AGENTS_MAX_RETRIES") {
            config.retry.max_retries = parse_number("AGENTS_MAX_RETRIES", &retries)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents).map_err(|e| {
            AgentsError::configuration(format!("invalid config file {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on settings that would only break later, mid-run.
    pub fn validate(&self) -> Result<()> {
        let key = self.api_key.trim();
        if key.is_empty() || key == API_KEY_PLACEHOLDER {
            return Err(AgentsError::configuration("OPENAI_API_KEY is not set"));
        }
        if self.model.trim().is_empty() {
            return Err(AgentsError::configuration("model name is empty"));
        }
        if self.max_turns == 0 {
            return Err(AgentsError::configuration("max_turns must be at least 1"));
        }
        self.retry.validate()
    }
}

fn parse_number(key: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|_| AgentsError::configuration(format!("{} must be a number, got '{}'", key, raw)))
}
