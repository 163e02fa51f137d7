//! Source tree enumeration.

use globset::GlobSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files found under a scan root.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Enumeration {
    /// Relative `/`-separated file paths, sorted.
    pub files: Vec<String>,
    /// Relative paths that could not be walked. Files under them are
    /// unknown this run, not removed.
    pub unreadable: Vec<(String, String)>,
}

impl Enumeration {
    /// Whether `path` lies under an entry that could not be walked.
    pub fn is_shadowed(&self, path: &str) -> bool {
        self.unreadable.iter().any(|(dir, _)| {
            path == dir || (path.starts_with(dir.as_str()) && path[dir.len()..].starts_with('/'))
        })
    }
}

/// Read access to the tree being documented.
pub trait SourceTree: Send + Sync {
    fn root(&self) -> &Path;

    /// List every file not excluded by the ignore set. Fails only when the
    /// root itself cannot be read.
    fn enumerate(&self) -> io::Result<Enumeration>;

    /// Size in bytes without reading the content.
    fn size(&self, path: &str) -> io::Result<u64>;

    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// A directory on the local filesystem.
pub struct FsSourceTree {
    root: PathBuf,
    ignore: GlobSet,
    /// Absolute directories excluded regardless of globs, such as the
    /// artifact store when it lives inside the root.
    excluded: Vec<PathBuf>,
}

impl FsSourceTree {
    pub fn new(root: impl Into<PathBuf>, ignore: GlobSet) -> Self {
        Self {
            root: root.into(),
            ignore,
            excluded: Vec::new(),
        }
    }

    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
        (!parts.is_empty()).then(|| parts.join("/"))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded.iter().any(|dir| path.starts_with(dir)) {
            return true;
        }
        match self.relative(path) {
            Some(rel) => self.ignore.is_match(&rel),
            None => false,
        }
    }
}

impl SourceTree for FsSourceTree {
    fn root(&self) -> &Path {
        &self.root
    }

    fn enumerate(&self) -> io::Result<Enumeration> {
        let meta = fs::metadata(&self.root)?;
        if !meta.is_dir() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "scan root is not a directory"));
        }
        fs::read_dir(&self.root)?;

        let mut enumeration = Enumeration::default();
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded(e.path()));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if let Some(rel) = self.relative(entry.path()) {
                        enumeration.files.push(rel);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let rel = e
                        .path()
                        .and_then(|p| self.relative(p))
                        .unwrap_or_default();
                    tracing::warn!(path = %rel, error = %e, "cannot walk path");
                    if !rel.is_empty() {
                        enumeration.unreadable.push((rel, e.to_string()));
                    }
                }
            }
        }
        enumeration.files.sort();
        enumeration.unreadable.sort();
        Ok(enumeration)
    }

    fn size(&self, path: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.root.join(path))?.len())
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_enumerate_respects_ignores() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.py", "x = 1\n");
        write(dir.path(), "src/b.log", "noise\n");
        write(dir.path(), "node_modules/left-pad/index.js", "module.exports = 1\n");
        write(dir.path(), ".codescribe/state.json", "{}");
        write(dir.path(), "package.json", "{}");

        let config = SyncConfig {
            ignore: vec!["*.log".into()],
            ..SyncConfig::default()
        };
        let tree = FsSourceTree::new(dir.path(), config.ignore_set().unwrap());
        let enumeration = tree.enumerate().unwrap();
        assert_eq!(enumeration.files, vec!["package.json", "src/a.py"]);
        assert!(enumeration.unreadable.is_empty());
    }

    #[test]
    fn test_explicit_exclusion() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "docs-out/a.md", "# out\n");
        write(dir.path(), "main.go", "package main\n");

        let config = SyncConfig::default();
        let tree = FsSourceTree::new(dir.path(), config.ignore_set().unwrap())
            .exclude(dir.path().join("docs-out"));
        assert_eq!(tree.enumerate().unwrap().files, vec!["main.go"]);
    }

    #[test]
    fn test_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let tree = FsSourceTree::new(dir.path().join("missing"), GlobSet::empty());
        assert!(tree.enumerate().is_err());
    }

    #[test]
    fn test_read_and_size() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/b.txt", "hello");
        let tree = FsSourceTree::new(dir.path(), GlobSet::empty());
        assert_eq!(tree.size("a/b.txt").unwrap(), 5);
        assert_eq!(tree.read("a/b.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_shadowed_paths() {
        let enumeration = Enumeration {
            files: Vec::new(),
            unreadable: vec![("locked".into(), "permission denied".into())],
        };
        assert!(enumeration.is_shadowed("locked/a.py"));
        assert!(enumeration.is_shadowed("locked"));
        assert!(!enumeration.is_shadowed("locked2/a.py"));
    }
}
