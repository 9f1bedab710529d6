//! Error types for huddle
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in huddle
#[derive(Debug, Error)]
pub enum HuddleError {
    /// Task update targeted a task that does not exist
    #[error("Task not found: {list_id}/{task_id}")]
    TaskNotFound { list_id: String, task_id: String },

    /// Caller asserted ownership of a task it does not own
    #[error("Task {task_id} is owned by session {owner}, not {caller}")]
    TaskOwnership {
        task_id: String,
        owner: String,
        caller: String,
    },

    /// A loop start conflicted with an already-active loop for the session
    #[error("Loop already active for session: {0}")]
    AlreadyActive(String),

    /// Delegation requested an unknown worker category
    #[error("Invalid subagent type: {0}")]
    InvalidSubagentType(String),

    /// Worker process could not be started
    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for huddle operations
pub type Result<T> = std::result::Result<T, HuddleError>;
