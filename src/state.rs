use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StageWatchError};
use crate::snapshot::{issue_key, IssuePipelineSnapshot, RepoRef};

pub const SCHEMA_VERSION: u32 = 1;

/// Last-known snapshot per item, carried between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Keyed by `owner/name#number`
    #[serde(default)]
    pub issues: IndexMap<String, IssuePipelineSnapshot>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    pub schema_version: u32,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            issues: IndexMap::new(),
            last_run: None,
            schema_version: SCHEMA_VERSION,
        }
    }
}

impl PersistedState {
    /// Point lookup by repository and item number.
    pub fn find_existing(&self, repo: &RepoRef, issue_number: u64) -> Option<&IssuePipelineSnapshot> {
        self.issues.get(&issue_key(repo, issue_number))
    }

    /// Returns a new state with every snapshot of this run written over its key.
    ///
    /// Keys not observed this run are carried over untouched; nothing is pruned.
    #[must_use]
    pub fn update(&self, snapshots: &[IssuePipelineSnapshot], now: DateTime<Utc>) -> Self {
        let mut issues = self.issues.clone();
        for snapshot in snapshots {
            issues.insert(snapshot.key(), snapshot.clone());
        }

        Self {
            issues,
            last_run: Some(now),
            schema_version: SCHEMA_VERSION,
        }
    }
}

/// File-backed store for [`PersistedState`].
///
/// Uses a single JSON file, by default in the platform data directory:
/// - Linux: `~/.local/share/stagewatch/state.json`
/// - macOS: `~/Library/Application Support/stagewatch/state.json`
///
/// A disabled store loads empty state and never writes.
pub struct StateStore {
    path: Option<PathBuf>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        debug!("Persisted state disabled");
        Self { path: None }
    }

    /// Platform default location of the state file.
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory exists on this platform.
    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::data_dir()
            .ok_or_else(|| StageWatchError::State("No data directory found".into()))?
            .join("stagewatch")
            .join("state.json"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Loads the previous run's state.
    ///
    /// A missing file yields empty state. Corrupt files and files written by a
    /// newer schema are logged and also yield empty state.
    ///
    /// # Errors
    ///
    /// Returns an error only if an existing file cannot be read.
    pub fn load(&self) -> Result<PersistedState> {
        let Some(path) = &self.path else {
            return Ok(PersistedState::default());
        };

        if !path.exists() {
            info!("No previous state at {}, starting fresh", path.display());
            return Ok(PersistedState::default());
        }

        let content = fs::read_to_string(path)?;
        let state = match serde_json::from_str::<PersistedState>(&content) {
            Ok(state) if state.schema_version > SCHEMA_VERSION => {
                warn!(
                    "State file {} has schema version {} (supported: {SCHEMA_VERSION}), ignoring it",
                    path.display(),
                    state.schema_version
                );
                PersistedState::default()
            }
            Ok(state) => {
                debug!(
                    "Loaded {} items from state: {}",
                    state.issues.len(),
                    path.display()
                );
                state
            }
            Err(e) => {
                warn!(
                    "Failed to parse state file {}: {e}, starting with empty state",
                    path.display()
                );
                PersistedState::default()
            }
        };

        Ok(state)
    }

    /// Writes the state atomically: a temporary sibling file is renamed over the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot be written.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;

        debug!(
            "Saved {} items to state: {}",
            state.issues.len(),
            path.display()
        );

        Ok(())
    }

    /// Removes the state file, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if path.exists() {
            fs::remove_file(path)?;
            info!("State cleared: {}", path.display());
        } else {
            info!("No state file found at: {}", path.display());
        }

        Ok(())
    }
}
