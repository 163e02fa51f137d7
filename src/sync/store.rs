//! Artifact stores.
//!
//! The engine only ever talks to a store through [`ArtifactStore`], keyed by
//! artifact id and listable by source path. Two implementations ship:
//!
//! - [`FsArtifactStore`]: markdown files under a directory, one per artifact
//! - [`MemoryStore`]: in-memory map with a call log, used by tests and
//!   dry runs

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::docs::{artifact_id, split_id, Artifact};
use crate::error::StoreError;

/// Where generated artifacts live.
pub trait ArtifactStore {
    /// Create or replace an artifact.
    fn put(&mut self, artifact: &Artifact) -> Result<(), StoreError>;

    /// Remove an artifact. Removing a missing artifact is not an error.
    fn delete(&mut self, id: &str) -> Result<(), StoreError>;

    /// Ids of every artifact stored for `source`, sorted.
    fn list(&self, source: &str) -> Result<Vec<String>, StoreError>;

    /// Every source path with at least one stored artifact, sorted.
    fn sources(&self) -> Result<Vec<String>, StoreError>;
}

/// One call made against a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Put(String),
    Delete(String),
}

impl StoreCall {
    pub fn id(&self) -> &str {
        match self {
            StoreCall::Put(id) | StoreCall::Delete(id) => id,
        }
    }
}

/// In-memory store recording every mutating call.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    artifacts: BTreeMap<String, Artifact>,
    calls: Vec<StoreCall>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Artifact> {
        self.artifacts.get(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.artifacts.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Mutating calls since creation or the last [`MemoryStore::take_calls`].
    pub fn calls(&self) -> &[StoreCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<StoreCall> {
        std::mem::take(&mut self.calls)
    }
}

impl ArtifactStore for MemoryStore {
    fn put(&mut self, artifact: &Artifact) -> Result<(), StoreError> {
        self.calls.push(StoreCall::Put(artifact.id.clone()));
        self.artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.calls.push(StoreCall::Delete(id.to_string()));
        self.artifacts.remove(id);
        Ok(())
    }

    fn list(&self, source: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .artifacts
            .values()
            .filter(|a| a.source == source)
            .map(|a| a.id.clone())
            .collect())
    }

    fn sources(&self) -> Result<Vec<String>, StoreError> {
        let sources: BTreeSet<&str> = self.artifacts.values().map(|a| a.source.as_str()).collect();
        Ok(sources.into_iter().map(str::to_string).collect())
    }
}

/// Markdown files at `<root>/<source path>/<key>.md`.
///
/// Keys are escaped so every id maps to a distinct file name and back.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn source_dir(&self, source: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(source);
        let valid = !source.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::InvalidId(source.to_string()));
        }
        Ok(self.root.join(rel))
    }

    /// File holding artifact `id`.
    pub fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let (source, key) = split_id(id).ok_or_else(|| StoreError::InvalidId(id.to_string()))?;
        Ok(self.source_dir(source)?.join(format!("{}.md", escape_key(key))))
    }

    /// Rendered content of a stored artifact.
    pub fn read(&self, id: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(id)?) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove empty directories from `dir` up to, not including, the root.
    fn prune(&self, mut dir: &Path) {
        while dir != self.root.as_path() && dir.starts_with(&self.root) {
            if fs::remove_dir(dir).is_err() {
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&mut self, artifact: &Artifact) -> Result<(), StoreError> {
        let path = self.path_for(&artifact.id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, artifact.render()?)?;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = path.parent() {
            self.prune(parent);
        }
        Ok(())
    }

    fn list(&self, source: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.source_dir(source)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir)?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".md")) else {
                continue;
            };
            if let Some(key) = unescape_key(stem) {
                ids.push(artifact_id(source, &key));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Directories under the root holding at least one artifact file. Files
    /// directly in the root belong to no source and are ignored.
    fn sources(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut sources = BTreeSet::new();
        for entry in WalkDir::new(&self.root).min_depth(2) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_artifact = entry
                .file_name()
                .to_str()
                .and_then(|n| n.strip_suffix(".md"))
                .and_then(unescape_key)
                .is_some();
            if !is_artifact {
                continue;
            }
            let Some(parent) = entry.path().parent() else {
                continue;
            };
            let Ok(rel) = parent.strip_prefix(&self.root) else {
                continue;
            };
            let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
            if let Some(parts) = parts {
                sources.insert(parts.join("/"));
            }
        }
        Ok(sources.into_iter().collect())
    }
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn unescape_key(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::parse_rendered;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn artifact(source: &str, key: &str) -> Artifact {
        Artifact {
            id: artifact_id(source, key),
            title: source.to_string(),
            body: format!("# {}\n", key),
            tags: BTreeSet::new(),
            cross_references: BTreeSet::new(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_escape_roundtrip() {
        for key in ["file-level", "run~2", "Thing", "weird name.x"] {
            assert_eq!(unescape_key(&escape_key(key)).as_deref(), Some(key));
        }
        assert_eq!(escape_key("run~2"), "run%7E2");
        assert_eq!(unescape_key("bad%G1"), None);
    }

    #[test]
    fn test_fs_store_put_list_delete() {
        let dir = TempDir::new().unwrap();
        let mut store = FsArtifactStore::new(dir.path().join("artifacts"));

        store.put(&artifact("src/a.py", "file-level")).unwrap();
        store.put(&artifact("src/a.py", "run~2")).unwrap();
        store.put(&artifact("b.py", "file-level")).unwrap();

        assert_eq!(
            store.list("src/a.py").unwrap(),
            vec!["src/a.py#file-level", "src/a.py#run~2"]
        );
        let content = store.read("src/a.py#file-level").unwrap().unwrap();
        let (front, body) = parse_rendered(&content).unwrap();
        assert_eq!(front.id, "src/a.py#file-level");
        assert_eq!(body, "# file-level\n");

        store.delete("src/a.py#file-level").unwrap();
        store.delete("src/a.py#run~2").unwrap();
        assert!(store.list("src/a.py").unwrap().is_empty());
        assert!(!dir.path().join("artifacts/src").exists());
        assert!(dir.path().join("artifacts").exists());

        // Deleting again is a no-op.
        store.delete("src/a.py#run~2").unwrap();
    }

    #[test]
    fn test_fs_store_sources() {
        let dir = TempDir::new().unwrap();
        let mut store = FsArtifactStore::new(dir.path().join("artifacts"));
        assert!(store.sources().unwrap().is_empty());

        store.put(&artifact("src/pkg/a.py", "file-level")).unwrap();
        store.put(&artifact("src/pkg/a.py", "Thing")).unwrap();
        store.put(&artifact("b.py", "file-level")).unwrap();
        store.put(&artifact("@tree", "overview")).unwrap();
        fs::write(dir.path().join("artifacts/stray.md"), "not an artifact").unwrap();
        fs::write(dir.path().join("artifacts/b.py/notes.txt"), "ignored").unwrap();

        assert_eq!(store.sources().unwrap(), vec!["@tree", "b.py", "src/pkg/a.py"]);

        store.delete("b.py#file-level").unwrap();
        assert_eq!(store.sources().unwrap(), vec!["@tree", "src/pkg/a.py"]);
    }

    #[test]
    fn test_fs_store_rejects_escaping_ids() {
        let dir = TempDir::new().unwrap();
        let mut store = FsArtifactStore::new(dir.path());
        assert!(matches!(
            store.put(&artifact("../outside.py", "file-level")),
            Err(StoreError::InvalidId(_))
        ));
        assert!(store.path_for("no-key").is_err());
    }

    #[test]
    fn test_memory_store_call_log() {
        let mut store = MemoryStore::new();
        store.put(&artifact("a.py", "file-level")).unwrap();
        store.delete("a.py#file-level").unwrap();
        assert_eq!(
            store.take_calls(),
            vec![
                StoreCall::Put("a.py#file-level".into()),
                StoreCall::Delete("a.py#file-level".into())
            ]
        );
        assert!(store.calls().is_empty());
        assert!(store.is_empty());
        assert!(store.sources().unwrap().is_empty());
    }
}
