//! Persisted sync state: one record per tracked file.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::StateError;
use crate::lang::Language;

/// Current on-disk format version.
pub const STATE_VERSION: u32 = 1;

/// What the last successful run knew about one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Content fingerprint the artifacts were generated from.
    pub fingerprint: String,
    pub language: Language,
    pub size: u64,
    /// Artifact id to digest of its rendered content.
    pub artifacts: BTreeMap<String, String>,
    /// Names other files may link to.
    #[serde(default)]
    pub provides: BTreeSet<String>,
    /// Names this file links to.
    #[serde(default)]
    pub links: BTreeSet<String>,
}

/// Every record, keyed by relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub version: u32,
    pub records: BTreeMap<String, SyncRecord>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            records: BTreeMap::new(),
        }
    }
}

/// Where sync state is persisted. Saves replace the whole state at once.
pub trait StateStore {
    fn load_all(&self) -> Result<SyncState, StateError>;
    fn save_all(&mut self, state: &SyncState) -> Result<(), StateError>;
}

/// JSON file written through a temporary file and a rename.
pub struct JsonStateFile {
    path: PathBuf,
}

impl JsonStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for JsonStateFile {
    fn load_all(&self) -> Result<SyncState, StateError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SyncState::default()),
            Err(e) => return Err(self.io_error(e)),
        };
        let state: SyncState = serde_json::from_str(&content).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        if state.version != STATE_VERSION {
            return Err(StateError::Version {
                found: state.version,
                expected: STATE_VERSION,
            });
        }
        Ok(state)
    }

    fn save_all(&mut self, state: &SyncState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(state).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.io_error(e)
        })
    }
}

/// State held in memory, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryState {
    pub state: SyncState,
    pub saves: usize,
}

impl StateStore for MemoryState {
    fn load_all(&self) -> Result<SyncState, StateError> {
        Ok(self.state.clone())
    }

    fn save_all(&mut self, state: &SyncState) -> Result<(), StateError> {
        self.state = state.clone();
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(fingerprint: &str) -> SyncRecord {
        let mut artifacts = BTreeMap::new();
        artifacts.insert("a.py#file-level".to_string(), "00ff".to_string());
        SyncRecord {
            fingerprint: fingerprint.to_string(),
            language: Language::Python,
            size: 12,
            artifacts,
            provides: ["a".to_string()].into_iter().collect(),
            links: BTreeSet::new(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let store = JsonStateFile::new(dir.path().join("state.json"));
        assert_eq!(store.load_all().unwrap(), SyncState::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonStateFile::new(dir.path().join("nested/state.json"));
        let mut state = SyncState::default();
        state.records.insert("a.py".into(), record("abc"));

        store.save_all(&state).unwrap();
        assert!(!dir.path().join("nested/state.json.tmp").exists());
        assert_eq!(store.load_all().unwrap(), state);
    }

    #[test]
    fn test_corrupt_and_version_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonStateFile::new(&path).load_all(),
            Err(StateError::Corrupt { .. })
        ));

        fs::write(&path, r#"{"version": 99, "records": {}}"#).unwrap();
        assert!(matches!(
            JsonStateFile::new(&path).load_all(),
            Err(StateError::Version { found: 99, .. })
        ));
    }
}
