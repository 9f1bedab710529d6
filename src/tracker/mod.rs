//! Background task tracking and notifications.
//!
//! The tracker watches one task list for a coordinator and answers "what
//! changed since I last looked?". Results feed a notification formatter
//! whose output is injected into the coordinator's next turn. Failed tasks
//! are always reported with their reason; nothing is silently dropped.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{TaskRecord, TaskStatus};
use crate::error::{HuddleError, Result};
use crate::repo::Repository;

/// Tracks outstanding background tasks per session.
///
/// The store stays the source of truth; the change cursor here is
/// per-process convenience. A fresh process reports everything once,
/// which is harmless because notifications are idempotent status text.
pub struct BackgroundTracker {
    repo: Repository,
    list_id: String,

    /// session -> (task id -> last seen (status, updated_at))
    ///
    /// Status is part of the cursor so a transition whose write lands in
    /// the same millisecond as the previous poll is still reported.
    seen: Mutex<HashMap<String, HashMap<String, (TaskStatus, i64)>>>,
}

impl BackgroundTracker {
    pub fn new(repo: Repository, list_id: &str) -> Self {
        Self {
            repo,
            list_id: list_id.to_string(),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Tasks owned by `session_id` that changed since the previous poll.
    ///
    /// First poll reports every task currently on the list for the
    /// session. Order follows the list order (creation time).
    pub fn poll_status(&self, session_id: &str) -> Result<Vec<TaskRecord>> {
        let tasks = self.repo.list_tasks(&self.list_id)?;

        let mut seen = self
            .seen
            .lock()
            .map_err(|e| HuddleError::Storage(e.to_string()))?;
        let session_seen = seen.entry(session_id.to_string()).or_default();

        let mut changed = Vec::new();
        for task in tasks {
            if task.session_id != session_id {
                continue;
            }
            let mark = (task.status, task.updated_at);
            let is_new = session_seen.get(&task.id).is_none_or(|last| *last != mark);
            if is_new {
                session_seen.insert(task.id.clone(), mark);
                changed.push(task);
            }
        }

        Ok(changed)
    }

    /// Tasks owned by `session_id` that have not reached a terminal state.
    pub fn outstanding(&self, session_id: &str) -> Result<Vec<TaskRecord>> {
        let tasks = self.repo.list_tasks(&self.list_id)?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.session_id == session_id && !t.status.is_terminal())
            .collect())
    }
}

/// Turns changed tasks into a status block for the coordinator's next turn.
pub trait NotificationFormatter: Send + Sync {
    /// `None` when there is nothing worth injecting.
    fn format(&self, tasks: &[TaskRecord]) -> Option<String>;
}

/// Default formatting: grouped by status, failure reasons verbatim.
#[derive(Debug, Default, Clone)]
pub struct DefaultFormatter;

impl NotificationFormatter for DefaultFormatter {
    fn format(&self, tasks: &[TaskRecord]) -> Option<String> {
        format_notification(tasks)
    }
}

/// Pure formatting function behind `DefaultFormatter`.
pub fn format_notification(tasks: &[TaskRecord]) -> Option<String> {
    if tasks.is_empty() {
        return None;
    }

    let mut out = String::from("## Background task update\n");
    for status in [
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
        TaskStatus::InProgress,
        TaskStatus::Pending,
    ] {
        let group: Vec<&TaskRecord> = tasks.iter().filter(|t| t.status == status).collect();
        if group.is_empty() {
            continue;
        }

        out.push_str(&format!("\n### {}\n", status));
        for task in group {
            out.push_str(&format!("- [{}] {}", task.id, task.description));
            match (status, &task.result) {
                (TaskStatus::Failed, Some(reason)) => {
                    out.push_str(&format!(" - failed: {}", reason));
                }
                (TaskStatus::Completed, Some(result)) => {
                    out.push_str(&format!(" - {}", result));
                }
                _ => {}
            }
            out.push('\n');
        }
    }

    Some(out)
}
