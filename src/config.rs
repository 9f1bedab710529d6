//! Configuration types for huddle.
//!
//! These are treated as already-validated inputs supplied by the host:
//! loop defaults, delegation defaults, and storage-path overrides. File
//! discovery and merging belong to the embedding application.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loops: LoopConfig,
    pub delegation: DelegationConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Default iteration cap when a loop start does not supply one
    pub max_iterations: u32,

    /// Default promise token the loop watches for
    pub completion_promise: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            completion_promise: "DONE".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Task list background delegations are recorded under
    pub default_list: String,

    /// Subagent type used when a request does not name one
    pub default_subagent_type: String,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            default_list: "delegations".to_string(),
            default_subagent_type: "general".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit storage root; overrides project-hash resolution
    pub root: Option<PathBuf>,

    /// Compatibility mode: share an external tool's cache directory
    pub compat_dir: Option<PathBuf>,
}
