use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgressError {
    /// The store exists but cannot be parsed. Operator must fix or delete it.
    #[error("progress store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("progress store encoding failed: {0}")]
    Encode(serde_json::Error),
    #[error("progress store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Which identifiers have been processed, across all runs so far.
/// `completed` only grows; `last_batch` never decreases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub completed: BTreeSet<String>,
    pub last_batch: u64,
}

impl ProgressState {
    pub fn is_completed(&self, identifier: &str) -> bool {
        self.completed.contains(identifier)
    }

    pub fn mark_completed(&mut self, identifier: &str) {
        self.completed.insert(identifier.to_string());
    }
}

/// JSON-file-backed store for [`ProgressState`].
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ProgressStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file is an empty state; an unreadable file is fatal.
    pub fn load(&self) -> Result<ProgressState, ProgressError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ProgressState::default()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&raw).map_err(|source| ProgressError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Write to a sibling temp file, then rename over the store.
    pub fn save(&self, state: &ProgressState) -> Result<(), ProgressError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let encoded = serde_json::to_vec_pretty(state).map_err(ProgressError::Encode)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ── Tests ──
