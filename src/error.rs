// ABOUTME: Defines all error types for the dine library using thiserror.
// ABOUTME: Each concern has its own error enum, unified under DineError.

use crate::resource::{AgentId, ResourceId};

/// Top-level error type for the dine library.
#[derive(Debug, thiserror::Error)]
pub enum DineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors from loading or validating a simulation configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Environment variable {var} has unparsable value '{value}'")]
    Env { var: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from resource lock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// The requester tried to release a resource it does not hold.
    #[error("agent {requester} does not hold resource {resource} (holder: {})", holder_label(.holder))]
    NotHolder {
        resource: ResourceId,
        holder: Option<AgentId>,
        requester: AgentId,
    },
}

fn holder_label(holder: &Option<AgentId>) -> String {
    match holder {
        Some(id) => id.to_string(),
        None => "none".to_string(),
    }
}
