//! Bulk extraction from an object store, with archival of processed objects.

use super::extraction::{extract_bytes, DocumentKind};
use crate::errors::{ExtractionError, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Default prefix processed objects are moved under.
pub const DEFAULT_ARCHIVE_PREFIX: &str = "archive_cv/";

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object name, `/`-separated.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

/// A flat, prefix-addressable blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists objects whose name starts with `prefix`, sorted by name.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError>;

    /// Reads an object.
    async fn get(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Writes an object, replacing any existing one.
    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), StoreError>;

    /// Deletes an object.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Store name for logging.
    fn name(&self) -> &str;
}

/// Object store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if name.starts_with(prefix) {
                    objects.push(ObjectInfo {
                        name,
                        size: metadata.len(),
                    });
                }
            }
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(name)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            _ => StoreError::Io(e),
        })
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            _ => StoreError::Io(e),
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Object store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object.
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.insert(name.into(), data.into());
    }

    /// Returns true if an object exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Returns all object names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let mut objects: Vec<ObjectInfo> = self
            .objects
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| ObjectInfo {
                name: e.key().clone(),
                size: e.value().len() as u64,
            })
            .collect();
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), StoreError> {
        self.objects.insert(name.to_string(), data);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// An object whose text was extracted but which could not be archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationFailure {
    /// The source object name.
    pub name: String,
    /// Why the move failed.
    pub reason: String,
}

/// Result of one bucket scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    /// Extracted text per object name.
    pub extracted: BTreeMap<String, String>,
    /// Extraction failures per object name. These objects stay in place.
    pub failed: BTreeMap<String, String>,
    /// Archive names of objects that were moved.
    pub archived: Vec<String>,
    /// Objects that were extracted but not moved.
    pub relocation_failures: Vec<RelocationFailure>,
}

impl ScanReport {
    /// Returns the number of objects looked at.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.extracted.len() + self.failed.len()
    }
}

/// Extracts every document under a prefix and archives the ones that worked.
///
/// The move is copy-then-delete and not transactional: a failure on one
/// object is recorded and the scan carries on with the next.
pub struct BucketScanner {
    store: Arc<dyn ObjectStore>,
    archive_prefix: String,
}

impl BucketScanner {
    /// Creates a scanner archiving under [`DEFAULT_ARCHIVE_PREFIX`].
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            archive_prefix: DEFAULT_ARCHIVE_PREFIX.to_string(),
        }
    }

    /// Sets the archive prefix.
    #[must_use]
    pub fn with_archive_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.archive_prefix = prefix.into();
        self
    }

    /// Scans all objects under `prefix`. Objects already archived are skipped.
    pub async fn scan(&self, prefix: &str) -> Result<ScanReport, StoreError> {
        let mut report = ScanReport::default();
        let objects = self.store.list(prefix).await?;

        for object in objects {
            if object.name.starts_with(&self.archive_prefix) {
                continue;
            }

            let data = match self.store.get(&object.name).await {
                Ok(data) => data,
                Err(e) => {
                    report.failed.insert(object.name, e.to_string());
                    continue;
                }
            };

            let data = match extract_object(&object.name, data).await {
                Ok((text, data)) => {
                    report.extracted.insert(object.name.clone(), text);
                    data
                }
                Err(e) => {
                    warn!(store = self.store.name(), object = %object.name, error = %e, "extraction failed");
                    report.failed.insert(object.name, e.to_string());
                    continue;
                }
            };

            let target = format!("{}{}", self.archive_prefix, object.name);
            match self.relocate(&object.name, &target, data).await {
                Ok(()) => report.archived.push(target),
                Err(e) => {
                    warn!(store = self.store.name(), object = %object.name, error = %e, "archive move failed");
                    report.relocation_failures.push(RelocationFailure {
                        name: object.name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            store = self.store.name(),
            prefix,
            extracted = report.extracted.len(),
            failed = report.failed.len(),
            archived = report.archived.len(),
            "bucket scan completed"
        );
        Ok(report)
    }

    async fn relocate(&self, source: &str, target: &str, data: Vec<u8>) -> Result<(), StoreError> {
        self.store.put(target, data).await?;
        self.store.delete(source).await
    }
}

/// Extracts an object's text and hands its bytes back for archiving.
async fn extract_object(
    name: &str,
    data: Vec<u8>,
) -> Result<(String, Vec<u8>), ExtractionError> {
    let kind = DocumentKind::from_name(name)?;
    let owned = name.to_string();
    let (text, data) = tokio::task::spawn_blocking(move || {
        let text = extract_bytes(kind, &owned, &data);
        (text, data)
    })
    .await
    .map_err(|e| ExtractionError::Unreadable {
        path: name.to_string(),
        reason: format!("extraction task failed: {e}"),
    })?;
    Ok((text?, data))
}
