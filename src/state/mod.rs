//! Persisted process state.
//!
//! The state file holds a context mapping plus a memory journal. It is read
//! fully once at startup (created on first access if absent) and rewritten
//! in full after every mutation. Writes are atomic: the new contents go to
//! a temp file in the same directory, are flushed and synced, and then
//! renamed over the target — a crash mid-update never leaves a half-written
//! file behind.
//!
//! # Versioning
//!
//! The file carries an explicit `version` field. A file without one is
//! treated as a legacy flat context mapping and migrated on load; a file
//! from a newer schema is rejected rather than silently misread.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Current state-file schema version.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Errors that can occur while loading or persisting process state.
#[derive(Debug, Error)]
pub enum StateError {
    /// The state file exists but could not be read.
    #[error("Failed to read state file: {path}")]
    Read {
        /// Path to the state file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The state file could not be parsed.
    #[error("Failed to parse state file: {path}")]
    Parse {
        /// Path to the state file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The state file was written by a newer schema.
    #[error("State file {path} has schema version {found}, this build supports up to {supported}")]
    VersionTooNew {
        /// Path to the state file.
        path: PathBuf,
        /// Version found in the file.
        found: u32,
        /// Newest version this build understands.
        supported: u32,
    },

    /// The state file could not be written.
    #[error("Failed to write state file: {path}")]
    Write {
        /// Path to the state file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// One entry in the memory journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// The remembered content.
    pub content: String,
    /// Optional tags for recall filtering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(content: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            content: content.into(),
            tags,
            recorded_at: Utc::now(),
        }
    }

    /// Case-insensitive match against content and tags.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.content.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.to_lowercase() == needle)
    }
}

/// On-disk shape of the state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    #[serde(default)]
    context: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    memories: Vec<MemoryEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_SCHEMA_VERSION,
            context: IndexMap::new(),
            memories: Vec::new(),
        }
    }
}

/// The persisted process state: context mapping plus memory journal.
///
/// Owned by the dispatcher and passed by reference; never a process-wide
/// singleton.
#[derive(Debug)]
pub struct ProcessState {
    path: PathBuf,
    file: StateFile,
}

impl ProcessState {
    /// Loads the state from `path`, creating an empty state if the file
    /// does not exist yet. The file itself is only created on the first
    /// mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed, or
    /// if it declares a newer schema version than this build supports.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();

        if !path.exists() {
            tracing::debug!(path = %path.display(), "No state file, starting empty");
            return Ok(Self {
                path,
                file: StateFile::default(),
            });
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| StateError::Read {
            path: path.clone(),
            source: e,
        })?;

        let raw: Value = serde_json::from_str(&contents).map_err(|e| StateError::Parse {
            path: path.clone(),
            source: e,
        })?;

        let file = Self::interpret(&path, raw)?;
        Ok(Self { path, file })
    }

    /// Interprets a parsed JSON value as a state file, migrating legacy
    /// shapes.
    fn interpret(path: &Path, raw: Value) -> Result<StateFile, StateError> {
        let declared = raw.get("version").and_then(Value::as_u64);

        match declared {
            Some(v) if u32::try_from(v).map_or(true, |v| v > STATE_SCHEMA_VERSION) => {
                Err(StateError::VersionTooNew {
                    path: path.to_path_buf(),
                    found: u32::try_from(v).unwrap_or(u32::MAX),
                    supported: STATE_SCHEMA_VERSION,
                })
            }
            Some(_) => {
                let mut file: StateFile =
                    serde_json::from_value(raw).map_err(|e| StateError::Parse {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                // Older-but-compatible files are re-stamped on next persist.
                file.version = STATE_SCHEMA_VERSION;
                Ok(file)
            }
            None => {
                // Legacy v0: a bare context mapping with no envelope.
                tracing::info!(path = %path.display(), "Migrating legacy state file to current schema");
                let context: IndexMap<String, Value> =
                    serde_json::from_value(raw).map_err(|e| StateError::Parse {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                Ok(StateFile {
                    version: STATE_SCHEMA_VERSION,
                    context,
                    memories: Vec::new(),
                })
            }
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a context value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.file.context.get(key)
    }

    /// The full context mapping.
    #[must_use]
    pub const fn context(&self) -> &IndexMap<String, Value> {
        &self.file.context
    }

    /// Sets a context value and persists the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<(), StateError> {
        self.file.context.insert(key.into(), value);
        self.persist()
    }

    /// Removes a context value and persists the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, StateError> {
        let removed = self.file.context.shift_remove(key);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    /// The memory journal, oldest first.
    #[must_use]
    pub fn memories(&self) -> &[MemoryEntry] {
        &self.file.memories
    }

    /// Appends a memory entry and persists the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub fn push_memory(&mut self, entry: MemoryEntry) -> Result<(), StateError> {
        self.file.memories.push(entry);
        self.persist()
    }

    /// Rewrites the state file atomically.
    fn persist(&self) -> Result<(), StateError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));

        std::fs::create_dir_all(parent).map_err(|e| StateError::Write {
            path: self.path.clone(),
            source: e,
        })?;

        let json =
            serde_json::to_string_pretty(&self.file).map_err(|e| StateError::Write {
                path: self.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;

        // Temp file in the same directory so the final rename stays on one
        // filesystem and is atomic.
        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| StateError::Write {
            path: self.path.clone(),
            source: e,
        })?;

        temp.write_all(json.as_bytes())
            .and_then(|()| temp.flush())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| StateError::Write {
                path: self.path.clone(),
                source: e,
            })?;

        temp.persist(&self.path).map_err(|e| StateError::Write {
            path: self.path.clone(),
            source: e.error,
        })?;

        tracing::trace!(path = %self.path.display(), "State persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn starts_empty_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let state = ProcessState::load(dir.path().join("state.json")).unwrap();
        assert!(state.context().is_empty());
        assert!(state.memories().is_empty());
        // No mutation yet, so no file either.
        assert!(!state.path().exists());
    }

    #[test]
    fn set_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = ProcessState::load(&path).unwrap();
        state.set("active_role", json!("writer")).unwrap();
        state.set("initialised", json!(true)).unwrap();

        let reloaded = ProcessState::load(&path).unwrap();
        assert_eq!(reloaded.context(), state.context());
        assert_eq!(reloaded.get("active_role"), Some(&json!("writer")));
    }

    #[test]
    fn memories_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = ProcessState::load(&path).unwrap();
        state
            .push_memory(MemoryEntry::new("prefers terse answers", vec!["style".to_string()]))
            .unwrap();

        let reloaded = ProcessState::load(&path).unwrap();
        assert_eq!(reloaded.memories(), state.memories());
    }

    #[test]
    fn written_file_declares_current_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = ProcessState::load(&path).unwrap();
        state.set("k", json!(1)).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw.get("version").and_then(Value::as_u64),
            Some(u64::from(STATE_SCHEMA_VERSION))
        );
    }

    #[test]
    fn legacy_flat_mapping_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"active_role": "writer"}"#).unwrap();

        let state = ProcessState::load(&path).unwrap();
        assert_eq!(state.get("active_role"), Some(&json!("writer")));
        assert!(state.memories().is_empty());
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"version": 99, "context": {}}"#).unwrap();

        let err = ProcessState::load(&path).unwrap_err();
        assert!(matches!(err, StateError::VersionTooNew { found: 99, .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let err = ProcessState::load(&path).unwrap_err();
        assert!(matches!(err, StateError::Parse { .. }));
    }

    #[test]
    fn remove_persists_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = ProcessState::load(&path).unwrap();
        state.set("k", json!("v")).unwrap();
        assert_eq!(state.remove("k").unwrap(), Some(json!("v")));
        assert_eq!(state.remove("k").unwrap(), None);

        let reloaded = ProcessState::load(&path).unwrap();
        assert!(reloaded.get("k").is_none());
    }

    #[test]
    fn memory_matching_is_case_insensitive() {
        let entry = MemoryEntry::new("Prefers British spelling", vec!["Style".to_string()]);
        assert!(entry.matches("british"));
        assert!(entry.matches("style"));
        assert!(!entry.matches("metric"));
    }
}
