//! Cross-reference resolution against the known artifact set.
//!
//! Artifacts store link names, never their resolution, so a file's artifact
//! does not change when some other file starts providing a name. Resolution
//! runs at the end of each sync over every file's recorded names.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A cross-reference no known file provides yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PendingLink {
    /// File whose artifact holds the link.
    pub source: String,
    pub name: String,
}

/// Which files provide which names.
#[derive(Debug, Default, Clone)]
pub struct ReferenceIndex {
    providers: BTreeMap<String, BTreeSet<String>>,
}

impl ReferenceIndex {
    /// Build from `(path, provided names)` pairs.
    pub fn build<'a, I, N>(files: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, N)>,
        N: IntoIterator<Item = &'a String>,
    {
        let mut providers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (path, names) in files {
            for name in names {
                providers.entry(name.clone()).or_default().insert(path.to_string());
            }
        }
        Self { providers }
    }

    /// Files providing `name`, in path order.
    pub fn resolve(&self, name: &str) -> Vec<&str> {
        self.providers
            .get(name)
            .map(|paths| paths.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Links from `(path, linked names)` pairs that nothing resolves.
    pub fn pending<'a, I, N>(&self, files: I) -> Vec<PendingLink>
    where
        I: IntoIterator<Item = (&'a str, N)>,
        N: IntoIterator<Item = &'a String>,
    {
        let mut pending: Vec<PendingLink> = files
            .into_iter()
            .flat_map(|(path, names)| {
                names
                    .into_iter()
                    .filter(|name| !self.providers.contains_key(name.as_str()))
                    .map(move |name| PendingLink {
                        source: path.to_string(),
                        name: name.clone(),
                    })
            })
            .collect();
        pending.sort();
        pending
    }
}
