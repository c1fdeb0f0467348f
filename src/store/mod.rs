//! Storage seams the resolver depends on.
//!
//! The resolver never talks to a concrete database. It reads unresolved
//! relationships and component lookups through these traits and writes
//! patches back through [`RelationshipRepository::update_relationships_bulk`],
//! serialized by a [`WriteGate`]. Two backends implement them: the libsql
//! [`crate::db::Database`] and the in-process [`MemoryStore`].

mod memory;

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::Result;
use crate::types::*;

pub use memory::{MemoryFileSystem, MemoryStore};

/// Reads and patches relationships.
#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Creates the indexes the unresolved queries rely on. Idempotent.
    async fn ensure_indexes(&self) -> Result<()>;

    /// Relationships whose target is not a component and has no
    /// `resolved_target_id` yet.
    async fn get_unresolved_targets(&self) -> Result<Vec<Relationship>>;

    /// Relationships whose source is not a component and has no
    /// `resolved_source_id` yet.
    async fn get_unresolved_sources(&self) -> Result<Vec<Relationship>>;

    /// Applies patches in one write. Already-set `resolved_*` columns are left
    /// untouched and metadata is merged, never replaced. Returns the number of
    /// rows updated.
    async fn update_relationships_bulk(&self, patches: &[RelationshipPatch]) -> Result<usize>;
}

/// Read-only component lookups.
#[async_trait]
pub trait ComponentRepository: Send + Sync {
    async fn get_component(&self, id: &str) -> Result<Option<Component>>;

    /// Bulk fetch by id. Unknown ids are silently absent from the result.
    async fn get_components(&self, ids: &[String]) -> Result<Vec<Component>>;

    async fn search_components(&self, query: &ComponentQuery) -> Result<Vec<Component>>;

    /// Component ids per exact name.
    async fn ids_by_names(&self, names: &[String]) -> Result<HashMap<String, Vec<String>>>;

    /// File component id per file path. Prefers components of kind `file`.
    async fn ids_by_file_paths(&self, paths: &[String]) -> Result<HashMap<String, String>>;
}

/// Filesystem access relative to the project root.
#[async_trait]
pub trait FileSystem: Send + Sync {
    fn project_root(&self) -> &Path;

    async fn exists(&self, path: &Path) -> bool;

    async fn read_to_string(&self, path: &Path) -> Option<String>;

    /// Relative paths are taken relative to the project root.
    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root().join(path)
        }
    }
}

/// The real filesystem, via `tokio::fs`.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    fn project_root(&self) -> &Path {
        &self.root
    }

    async fn exists(&self, path: &Path) -> bool {
        let path = self.absolute(path);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }

    async fn read_to_string(&self, path: &Path) -> Option<String> {
        tokio::fs::read_to_string(self.absolute(path)).await.ok()
    }
}

/// Serializes graph mutations so no two writes interleave.
///
/// Shared between the resolver and whatever else writes to the store (the
/// indexing pipeline). Each write holds the gate for exactly one batch.
#[derive(Debug, Default)]
pub struct WriteGate {
    lock: Mutex<()>,
}

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `write` while holding the gate.
    pub async fn run<F, T>(&self, write: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.lock.lock().await;
        write.await
    }
}
