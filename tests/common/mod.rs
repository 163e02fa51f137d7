//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use codescribe::config::SyncConfig;
use codescribe::docs::Artifact;
use codescribe::error::StoreError;
use codescribe::sync::{ArtifactStore, Enumeration, MemoryStore, SourceTree};

/// Source tree held in memory, with knobs for unreadable files and
/// directories that cannot be walked.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    root: PathBuf,
    files: BTreeMap<String, Vec<u8>>,
    unreadable_files: BTreeSet<String>,
    unwalkable_dirs: BTreeSet<String>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/memory"),
            files: BTreeMap::new(),
            unreadable_files: BTreeSet::new(),
            unwalkable_dirs: BTreeSet::new(),
        }
    }

    pub fn with(mut self, path: &str, content: &str) -> Self {
        self.write(path, content);
        self
    }

    pub fn write(&mut self, path: &str, content: &str) {
        self.files.insert(path.to_string(), content.as_bytes().to_vec());
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(path);
    }

    /// Keep `path` listed but fail every read of it.
    pub fn make_unreadable(&mut self, path: &str) {
        self.unreadable_files.insert(path.to_string());
    }

    /// Hide everything under `dir` and report the directory as unwalkable.
    pub fn lock_dir(&mut self, dir: &str) {
        self.unwalkable_dirs.insert(dir.to_string());
    }

    fn hidden(&self, path: &str) -> bool {
        self.unwalkable_dirs
            .iter()
            .any(|dir| path.starts_with(&format!("{}/", dir)))
    }
}

impl SourceTree for MemoryTree {
    fn root(&self) -> &Path {
        &self.root
    }

    fn enumerate(&self) -> io::Result<Enumeration> {
        Ok(Enumeration {
            files: self
                .files
                .keys()
                .filter(|p| !self.hidden(p))
                .cloned()
                .collect(),
            unreadable: self
                .unwalkable_dirs
                .iter()
                .map(|dir| (dir.clone(), "permission denied".to_string()))
                .collect(),
        })
    }

    fn size(&self, path: &str) -> io::Result<u64> {
        self.files
            .get(path)
            .map(|c| c.len() as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        if self.unreadable_files.contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

/// Store that accepts a fixed number of writes and then rejects the rest.
pub struct FailingStore<'a> {
    pub inner: &'a mut MemoryStore,
    pub writes_left: usize,
}

impl<'a> FailingStore<'a> {
    pub fn new(inner: &'a mut MemoryStore, writes_left: usize) -> Self {
        Self { inner, writes_left }
    }

    fn spend(&mut self, id: &str) -> Result<(), StoreError> {
        if self.writes_left == 0 {
            return Err(StoreError::Rejected(format!("quota exhausted at {}", id)));
        }
        self.writes_left -= 1;
        Ok(())
    }
}

impl ArtifactStore for FailingStore<'_> {
    fn put(&mut self, artifact: &Artifact) -> Result<(), StoreError> {
        self.spend(&artifact.id)?;
        self.inner.put(artifact)
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.spend(id)?;
        self.inner.delete(id)
    }

    fn list(&self, source: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(source)
    }

    fn sources(&self) -> Result<Vec<String>, StoreError> {
        self.inner.sources()
    }
}

/// Store whose listings fail, counting any write that gets through.
#[derive(Debug, Default)]
pub struct UnlistableStore {
    pub writes: usize,
}

impl ArtifactStore for UnlistableStore {
    fn put(&mut self, _artifact: &Artifact) -> Result<(), StoreError> {
        self.writes += 1;
        Ok(())
    }

    fn delete(&mut self, _id: &str) -> Result<(), StoreError> {
        self.writes += 1;
        Ok(())
    }

    fn list(&self, source: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("cannot list {}", source),
        )))
    }

    fn sources(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "cannot list store")))
    }
}

/// Defaults with a small worker pool so tests stay cheap. Tree documents
/// are off so counts and ids are per file; tests of them opt back in.
pub fn config() -> SyncConfig {
    SyncConfig {
        concurrency: 2,
        tree_documents: false,
        ..SyncConfig::default()
    }
}

pub fn config_with_tree_documents() -> SyncConfig {
    SyncConfig {
        tree_documents: true,
        ..config()
    }
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
