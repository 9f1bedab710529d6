//! Durable key-value file store.
//!
//! Persists one JSON document per path. Writes go to a temporary sibling
//! file and are renamed onto the target, so a concurrent reader always sees
//! either the fully-previous or fully-new content. Reads tolerate absent and
//! corrupt files: both come back as `None` so a partially-written record
//! from a crashed process can never halt a caller.

mod paths;

use std::fs;
use std::path::Path;

use log::warn;
use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{HuddleError, Result};

pub use paths::StorePaths;

/// Atomic JSON document store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore;

impl FileStore {
    /// Read and deserialize the document at `path`.
    ///
    /// Returns `None` when the file is absent. Content that fails to parse
    /// or validate against `T` is logged and also returned as `None`;
    /// corruption is absorbed here, not propagated. Deserialization runs on
    /// the raw bytes so garbage that is not even UTF-8 falls into the same
    /// treated-as-absent branch.
    pub fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Treating unreadable record as absent: {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Serialize `value` and atomically write it to `path`.
    ///
    /// The document lands at a temporary sibling first and is renamed into
    /// place. On any failure the temporary file is removed and the error is
    /// propagated; the target is left untouched.
    pub fn write<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| HuddleError::Storage(format!("Path has no parent: {}", path.display())))?;
        fs::create_dir_all(parent)?;

        let suffix: u32 = rand::rng().random();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("record");
        let tmp_path = parent.join(format!(".{}.tmp.{:08x}", file_name, suffix));

        let json = serde_json::to_string_pretty(value)?;

        let write_result = fs::write(&tmp_path, json.as_bytes())
            .and_then(|_| fs::rename(&tmp_path, path));

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        Ok(())
    }

    /// Idempotent directory creation.
    pub fn ensure_dir(path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    /// Idempotent delete; an absent path is success.
    pub fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
