//! In-process implementations of the store traits.
//!
//! Backed by `tokio::sync::RwLock` maps. Useful for embedders that keep the
//! graph in memory and for exercising the resolver without a database.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ComponentRepository, FileSystem, RelationshipRepository};
use crate::errors::{LinkError, Result};
use crate::types::*;

/// Components and relationships held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    components: RwLock<HashMap<String, Component>>,
    relationships: RwLock<BTreeMap<String, RawRelationship>>,
    patch_log: RwLock<Vec<RelationshipPatch>>,
    bulk_update_calls: AtomicU64,
    target_fetches: AtomicU64,
    source_fetches: AtomicU64,
    failing_updates: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_components(&self, components: Vec<Component>) {
        let mut map = self.components.write().await;
        for component in components {
            map.insert(component.id.clone(), component);
        }
    }

    pub async fn insert_relationships(&self, relationships: Vec<RawRelationship>) {
        let mut map = self.relationships.write().await;
        for rel in relationships {
            map.insert(rel.id.clone(), rel);
        }
    }

    pub async fn remove_component(&self, id: &str) {
        self.components.write().await.remove(id);
    }

    /// The stored row for `id`, with raw endpoints.
    pub async fn relationship(&self, id: &str) -> Option<RawRelationship> {
        self.relationships.read().await.get(id).cloned()
    }

    /// Every patch successfully applied, in application order.
    pub async fn applied_patches(&self) -> Vec<RelationshipPatch> {
        self.patch_log.read().await.clone()
    }

    /// Number of `update_relationships_bulk` calls, failed ones included.
    pub fn bulk_update_calls(&self) -> u64 {
        self.bulk_update_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_unresolved_targets` calls; one per pass.
    pub fn target_fetches(&self) -> u64 {
        self.target_fetches.load(Ordering::SeqCst)
    }

    pub fn source_fetches(&self) -> u64 {
        self.source_fetches.load(Ordering::SeqCst)
    }

    /// Makes the next `count` bulk updates fail without writing anything.
    pub fn fail_next_updates(&self, count: u64) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    async fn unresolved(&self, side: Side) -> Vec<Relationship> {
        let components = self.components.read().await;
        let relationships = self.relationships.read().await;
        relationships
            .values()
            .filter(|rel| match side {
                Side::Target => {
                    rel.resolved_target_id.is_none() && !components.contains_key(&rel.target_id)
                }
                Side::Source => {
                    rel.resolved_source_id.is_none() && !components.contains_key(&rel.source_id)
                }
            })
            .map(|rel| {
                let source_known = components.contains_key(&rel.source_id);
                let target_known = components.contains_key(&rel.target_id);
                rel.clone().decode(source_known, target_known)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Target,
    Source,
}

#[async_trait]
impl RelationshipRepository for MemoryStore {
    async fn ensure_indexes(&self) -> Result<()> {
        Ok(())
    }

    async fn get_unresolved_targets(&self) -> Result<Vec<Relationship>> {
        self.target_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.unresolved(Side::Target).await)
    }

    async fn get_unresolved_sources(&self) -> Result<Vec<Relationship>> {
        self.source_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.unresolved(Side::Source).await)
    }

    async fn update_relationships_bulk(&self, patches: &[RelationshipPatch]) -> Result<usize> {
        self.bulk_update_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(LinkError::database(
                "update_relationships_bulk",
                "injected write failure",
            ));
        }

        let mut relationships = self.relationships.write().await;
        let mut updated = 0;
        for patch in patches {
            let Some(rel) = relationships.get_mut(&patch.relationship_id) else {
                continue;
            };
            if rel.resolved_target_id.is_none() {
                rel.resolved_target_id = patch.resolved_target_id.clone();
            }
            if rel.resolved_source_id.is_none() {
                rel.resolved_source_id = patch.resolved_source_id.clone();
            }
            rel.metadata = merge_metadata(&rel.metadata, patch.metadata.clone());
            updated += 1;
        }
        drop(relationships);

        self.patch_log.write().await.extend(patches.iter().cloned());
        Ok(updated)
    }
}

#[async_trait]
impl ComponentRepository for MemoryStore {
    async fn get_component(&self, id: &str) -> Result<Option<Component>> {
        Ok(self.components.read().await.get(id).cloned())
    }

    async fn get_components(&self, ids: &[String]) -> Result<Vec<Component>> {
        let components = self.components.read().await;
        Ok(ids.iter().filter_map(|id| components.get(id).cloned()).collect())
    }

    async fn search_components(&self, query: &ComponentQuery) -> Result<Vec<Component>> {
        let needle = query.name_contains.to_lowercase();
        let components = self.components.read().await;
        let mut matches: Vec<Component> = components
            .values()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .filter(|c| query.language.map_or(true, |lang| c.language == lang))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.truncate(query.limit);
        Ok(matches)
    }

    async fn ids_by_names(&self, names: &[String]) -> Result<HashMap<String, Vec<String>>> {
        let components = self.components.read().await;
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for component in components.values() {
            if names.contains(&component.name) {
                result
                    .entry(component.name.clone())
                    .or_default()
                    .push(component.id.clone());
            }
        }
        for ids in result.values_mut() {
            ids.sort();
        }
        Ok(result)
    }

    async fn ids_by_file_paths(&self, paths: &[String]) -> Result<HashMap<String, String>> {
        let components = self.components.read().await;
        let mut result = HashMap::new();
        for path in paths {
            let best = components
                .values()
                .filter(|c| &c.file_path == path)
                .min_by(|a, b| b.is_file().cmp(&a.is_file()).then_with(|| a.id.cmp(&b.id)));
            if let Some(component) = best {
                result.insert(path.clone(), component.id.clone());
            }
        }
        Ok(result)
    }
}

/// A set of files with contents, rooted at a fixed project root.
#[derive(Debug)]
pub struct MemoryFileSystem {
    root: PathBuf,
    files: std::sync::RwLock<HashMap<PathBuf, String>>,
    exists_calls: AtomicU64,
}

impl MemoryFileSystem {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            files: std::sync::RwLock::new(HashMap::new()),
            exists_calls: AtomicU64::new(0),
        }
    }

    /// Adds a file; relative paths are placed under the root.
    pub fn add_file(&self, path: &str, contents: &str) {
        let path = self.absolute(Path::new(path));
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path, contents.to_string());
    }

    /// Number of `exists` calls that reached this filesystem.
    pub fn exists_calls(&self) -> u64 {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    fn project_root(&self) -> &Path {
        &self.root
    }

    async fn exists(&self, path: &Path) -> bool {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        let path = self.absolute(path);
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&path)
    }

    async fn read_to_string(&self, path: &Path) -> Option<String> {
        let path = self.absolute(path);
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&path)
            .cloned()
    }
}
