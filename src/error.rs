//! Error types for the concierge desk

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, AgentsError>;

/// Main error type
///
/// Variants fall into four families: configuration problems (fatal at
/// startup), query validation (recovered by the read loop), execution failures
/// surfaced by the engine, and observer failures (only ever logged).
#[derive(Debug, Error)]
pub enum AgentsError {
    /// Missing credential, malformed agent descriptor, duplicate names
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Empty or unusable user query
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Error from the OpenAI API
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    /// The model produced something the run loop cannot use
    #[error("Model behavior error: {message}")]
    ModelBehavior { message: String },

    /// Tool execution error
    #[error("Tool execution error: {message}")]
    ToolExecution { message: String },

    /// Maximum turns exceeded
    #[error("Maximum turns exceeded: {max_turns}")]
    MaxTurnsExceeded { max_turns: usize },

    /// A lifecycle observer failed to record an event
    #[error("Hook error: {message}")]
    Hook { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentsError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn model_behavior(message: impl Into<String>) -> Self {
        Self::ModelBehavior {
            message: message.into(),
        }
    }

    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::ToolExecution {
            message: message.into(),
        }
    }

    /// True for errors the read loop recovers from by re-prompting.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Determine if an error is worth retrying at the provider boundary
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentsError::OpenAI(err) => !matches!(
                err,
                async_openai::error::OpenAIError::InvalidArgument(_)
                    | async_openai::error::OpenAIError::JSONDeserialize(_)
            ),
            AgentsError::Io(_) => true,
            _ => false,
        }
    }
}
