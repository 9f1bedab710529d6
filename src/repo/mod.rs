//! Task & inbox repository.
//!
//! Thin coordination layer over the file store. Every operation re-reads
//! the current document, mutates it, and writes it back through the atomic
//! store. The read-modify-write is not itself transactional: two processes
//! appending to the same inbox at the same instant resolve last-writer-wins.
//! Message volume is small and the critical section is short, so the race
//! window is accepted rather than locked away.

use log::debug;

use crate::domain::{Inbox, InboxMessage, TaskRecord, TaskStatus};
use crate::error::{HuddleError, Result};
use crate::store::{FileStore, StorePaths};

/// Repository for task records and team inboxes.
#[derive(Debug, Clone)]
pub struct Repository {
    paths: StorePaths,
}

impl Repository {
    /// Create a repository over a resolved storage root.
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    /// The path rules this repository persists through.
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    // --- tasks ---

    /// Persist a new task record.
    pub fn create_task(&self, task: &TaskRecord) -> Result<()> {
        let path = self.paths.task_path(&task.list_id, &task.id);
        FileStore::write(&path, task)?;
        debug!("Created task {}/{}", task.list_id, task.id);
        Ok(())
    }

    /// Read a task record; absent or unreadable records come back as `None`.
    pub fn get_task(&self, list_id: &str, task_id: &str) -> Result<Option<TaskRecord>> {
        FileStore::read(&self.paths.task_path(list_id, task_id))
    }

    /// List every readable task in a list.
    ///
    /// Records that fail to parse are skipped by the store's read
    /// tolerance, so one damaged file never hides the rest of the list.
    pub fn list_tasks(&self, list_id: &str) -> Result<Vec<TaskRecord>> {
        let dir = self.paths.task_list_dir(list_id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tasks = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(task) = FileStore::read::<TaskRecord>(&path)? {
                tasks.push(task);
            }
        }

        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    /// Transition a task's status, asserting the caller's ownership.
    ///
    /// `caller_session` must match the session recorded on the task; the
    /// single-writer convention is a protocol invariant, and this assertion
    /// is what makes violations visible instead of silent. A missing task
    /// is `TaskNotFound`, never a no-op.
    pub fn update_task_status(
        &self,
        list_id: &str,
        task_id: &str,
        status: TaskStatus,
        result: Option<String>,
        caller_session: &str,
    ) -> Result<TaskRecord> {
        let mut task =
            self.get_task(list_id, task_id)?
                .ok_or_else(|| HuddleError::TaskNotFound {
                    list_id: list_id.to_string(),
                    task_id: task_id.to_string(),
                })?;

        if task.session_id != caller_session {
            return Err(HuddleError::TaskOwnership {
                task_id: task_id.to_string(),
                owner: task.session_id.clone(),
                caller: caller_session.to_string(),
            });
        }

        task.status = status;
        if result.is_some() {
            task.result = result;
        }
        task.touch();

        FileStore::write(&self.paths.task_path(list_id, task_id), &task)?;
        debug!("Task {}/{} -> {}", list_id, task_id, status);
        Ok(task)
    }

    // --- inboxes ---

    /// Append a message to `(team, agent)`'s inbox. FIFO within the inbox.
    pub fn append_to_inbox(&self, team: &str, agent: &str, message: InboxMessage) -> Result<()> {
        let path = self.paths.inbox_path(team, agent);
        let mut inbox: Inbox = FileStore::read(&path)?.unwrap_or_default();
        inbox.push(message);
        FileStore::write(&path, &inbox)?;
        Ok(())
    }

    /// Read the whole inbox without consuming anything.
    pub fn read_inbox(&self, team: &str, agent: &str) -> Result<Inbox> {
        let path = self.paths.inbox_path(team, agent);
        Ok(FileStore::read(&path)?.unwrap_or_default())
    }

    /// Consume unread messages: mark them read, persist, and return them
    /// in delivery order. Only the addressed agent should call this.
    pub fn take_unread(&self, team: &str, agent: &str) -> Result<Vec<InboxMessage>> {
        let path = self.paths.inbox_path(team, agent);
        let mut inbox: Inbox = FileStore::read(&path)?.unwrap_or_default();
        let taken = inbox.mark_all_read();
        if !taken.is_empty() {
            FileStore::write(&path, &inbox)?;
        }
        Ok(taken)
    }
}
