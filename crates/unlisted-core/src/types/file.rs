//! Shared files and the published file-list manifest.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Deterministic identifier of a blob held by the storage service.
///
/// Fetching the same address always yields the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One shared item.
///
/// Equality, ordering and hashing cover both `name` and `hash`, so two files
/// with the same name but different content are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct File {
    pub name: String,
    /// Absent only before the file has been committed to the storage service
    pub hash: Option<ContentAddress>,
}

impl File {
    pub fn new(name: impl Into<String>, hash: ContentAddress) -> Self {
        Self {
            name: name.into(),
            hash: Some(hash),
        }
    }

    /// A file that has not been uploaded yet
    pub fn uncommitted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash: None,
        }
    }
}

/// A file manifest as published to (or fetched from) the naming layer.
///
/// `hash` is the content address of the encoded manifest; it is `None` until
/// the list has been published at least once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileList {
    hash: Option<ContentAddress>,
    files: BTreeSet<File>,
}

impl FileList {
    /// An empty, never-published list
    pub fn new() -> Self {
        Self::default()
    }

    /// A list that is known to live at `hash`
    pub fn published(hash: ContentAddress, files: impl IntoIterator<Item = File>) -> Self {
        Self {
            hash: Some(hash),
            files: files.into_iter().collect(),
        }
    }

    pub fn hash(&self) -> Option<&ContentAddress> {
        self.hash.as_ref()
    }

    pub fn files(&self) -> &BTreeSet<File> {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Same files, now published at `hash`
    pub fn with_hash(&self, hash: ContentAddress) -> Self {
        Self {
            hash: Some(hash),
            files: self.files.clone(),
        }
    }

    /// Set union with `files`. The published hash is kept: a merged list is
    /// not republished yet.
    pub fn merged(&self, files: impl IntoIterator<Item = File>) -> Self {
        let mut merged = self.files.clone();
        merged.extend(files);
        Self {
            hash: self.hash.clone(),
            files: merged,
        }
    }

    /// Everything except `files`. The published hash is kept.
    pub fn without(&self, files: &[File]) -> Self {
        Self {
            hash: self.hash.clone(),
            files: self
                .files
                .iter()
                .filter(|f| !files.contains(f))
                .cloned()
                .collect(),
        }
    }

    pub fn contains(&self, file: &File) -> bool {
        self.files.contains(file)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.name == name)
    }

    /// All entries carrying `name` (at most one unless a stale hash lingers)
    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a File> + 'a {
        self.files.iter().filter(move |f| f.name == name)
    }

    /// Encode the files as the JSON array that is uploaded and published.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.files)
    }

    /// Decode a fetched manifest.
    pub fn decode(bytes: &[u8]) -> Result<BTreeSet<File>, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
