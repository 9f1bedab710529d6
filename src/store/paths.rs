//! Storage-root resolution and deterministic path derivation.
//!
//! Independent processes agree on record locations without coordination
//! because every path is a pure function of the resolved root and the
//! record's identifiers:
//!
//! - tasks:      `<root>/tasks/<list_id>/<task_id>.json`
//! - inboxes:    `<root>/teams/<team>/inboxes/<agent>.json`
//! - loop state: `<root>/sessions/<session_id>/loop-state.json`

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::StorageConfig;
use crate::error::{HuddleError, Result};

/// Resolved storage root plus the path derivation rules.
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    /// Resolve the storage root for a project directory.
    ///
    /// Precedence: explicit `root` override, then a configured compatibility
    /// directory shared with an external tool's cache, then the default
    /// `<home>/.huddle/<project-hash>` layout.
    pub fn resolve(project_dir: &Path, config: &StorageConfig) -> Result<Self> {
        if let Some(root) = &config.root {
            return Ok(Self { root: root.clone() });
        }

        if let Some(compat) = &config.compat_dir {
            return Ok(Self {
                root: compat.join("huddle"),
            });
        }

        let hash = compute_project_hash(project_dir)?;
        let home = dirs::home_dir()
            .ok_or_else(|| HuddleError::Storage("Cannot determine home directory".to_string()))?;
        Ok(Self {
            root: home.join(".huddle").join(hash),
        })
    }

    /// Build paths directly on a known root. Useful for testing with
    /// custom directories.
    pub fn at_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The resolved root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one task list.
    pub fn task_list_dir(&self, list_id: &str) -> PathBuf {
        self.root.join("tasks").join(list_id)
    }

    /// Path of a single task record.
    pub fn task_path(&self, list_id: &str, task_id: &str) -> PathBuf {
        self.task_list_dir(list_id).join(format!("{}.json", task_id))
    }

    /// Path of one team member's inbox.
    pub fn inbox_path(&self, team: &str, agent: &str) -> PathBuf {
        self.root
            .join("teams")
            .join(team)
            .join("inboxes")
            .join(format!("{}.json", agent))
    }

    /// Path of a session's loop state record.
    pub fn loop_state_path(&self, session_id: &str) -> PathBuf {
        self.root
            .join("sessions")
            .join(session_id)
            .join("loop-state.json")
    }
}

/// Hash a project directory into a stable store-directory name.
///
/// First 16 hex chars of sha256 over the canonicalized path.
pub fn compute_project_hash(project_dir: &Path) -> Result<String> {
    let canonical = project_dir.canonicalize()?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let result = hasher.finalize();

    Ok(hex::encode(&result[..8]))
}
