//! Task records for delegated units of work.
//!
//! A task is identified by `(list_id, task_id)` and owned by the session
//! that created it. The creating coordinator transitions it to
//! `in_progress`; whichever process holds that responsibility is the sole
//! status writer until the task reaches a terminal state.

use serde::{Deserialize, Serialize};

use crate::id::{generate_task_id, now_ms};

/// One delegated unit of work, persisted as a JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    /// Timestamp-based ID: "1738300800123-a1b2"
    pub id: String,

    /// Task list this record belongs to
    pub list_id: String,

    /// Human-readable description of the work
    pub description: String,

    /// Current status
    pub status: TaskStatus,

    /// Session that owns this task (sole status writer)
    pub session_id: String,

    /// Result payload once the task completes or fails
    pub result: Option<String>,

    /// Unix timestamp in milliseconds
    pub created_at: i64,

    /// Unix timestamp in milliseconds
    pub updated_at: i64,
}

impl TaskRecord {
    /// Create a new pending task owned by `session_id`.
    pub fn new(list_id: &str, description: &str, session_id: &str) -> Self {
        let now = now_ms();
        Self {
            id: generate_task_id(),
            list_id: list_id.to_string(),
            description: description.to_string(),
            status: TaskStatus::Pending,
            session_id: session_id.to_string(),
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the timestamp to now.
    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}

/// Task status state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, no worker dispatched yet
    Pending,
    /// A worker currently holds responsibility
    InProgress,
    /// Worker finished successfully
    Completed,
    /// Worker reported an unrecoverable error
    Failed,
    /// Coordinator abandoned the task
    Cancelled,
}

impl TaskStatus {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
