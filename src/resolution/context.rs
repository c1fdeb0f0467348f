use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::namespace::ComposerResolver;
use crate::config::{IgnoreMatcher, LinkConfig};
use crate::errors::Result;
use crate::store::{ComponentRepository, FileSystem};
use crate::types::*;

/// Component ids fetched per bulk lookup when warming the location cache.
pub const PREFETCH_CHUNK: usize = 500;

/// Per-pass arena shared by both resolution engines.
///
/// Holds the lookup caches, the queued patches and the pass metrics. A new
/// context starts every pass; nothing cached here outlives it, so changes
/// made between passes are always observed.
pub struct ResolutionContext<'a> {
    components: &'a dyn ComponentRepository,
    fs: &'a dyn FileSystem,
    config: &'a LinkConfig,
    ignore: IgnoreMatcher,
    /// `None` records a component that no longer exists.
    locations: HashMap<String, Option<ComponentLocation>>,
    file_ids: HashMap<String, Option<String>>,
    /// `None` records a name that is missing or ambiguous.
    name_ids: HashMap<String, Option<String>>,
    fs_exists: HashMap<PathBuf, bool>,
    composer: Option<ComposerResolver>,
    target_updates: Vec<RelationshipPatch>,
    source_updates: Vec<RelationshipPatch>,
    metrics: ResolutionMetrics,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(
        components: &'a dyn ComponentRepository,
        fs: &'a dyn FileSystem,
        config: &'a LinkConfig,
    ) -> Self {
        Self {
            components,
            fs,
            config,
            ignore: IgnoreMatcher::new(&config.ignore),
            locations: HashMap::new(),
            file_ids: HashMap::new(),
            name_ids: HashMap::new(),
            fs_exists: HashMap::new(),
            composer: None,
            target_updates: Vec::new(),
            source_updates: Vec::new(),
            metrics: ResolutionMetrics::default(),
        }
    }

    /// Clears caches, queues and metrics.
    pub fn reset(&mut self) {
        self.locations.clear();
        self.file_ids.clear();
        self.name_ids.clear();
        self.fs_exists.clear();
        self.composer = None;
        self.target_updates.clear();
        self.source_updates.clear();
        self.metrics = ResolutionMetrics::default();
    }

    pub fn config(&self) -> &LinkConfig {
        self.config
    }

    pub fn project_root(&self) -> &Path {
        self.fs.project_root()
    }

    pub fn is_ignored(&self, path_or_specifier: &str) -> bool {
        self.ignore.is_ignored(path_or_specifier)
    }

    pub fn metrics(&self) -> &ResolutionMetrics {
        &self.metrics
    }

    /// Warms the location cache for every concrete source of `relationships`
    /// with bulk lookups of [`PREFETCH_CHUNK`] ids. Returns the number of ids
    /// looked up.
    pub async fn prefetch_lookups(&mut self, relationships: &[Relationship]) -> Result<usize> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = relationships
            .iter()
            .filter_map(|rel| rel.source.component_id())
            .filter(|id| !self.locations.contains_key(*id))
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect();

        for chunk in ids.chunks(PREFETCH_CHUNK) {
            let found = self.components.get_components(chunk).await?;
            let mut by_id: HashMap<String, ComponentLocation> = found
                .into_iter()
                .map(|c| {
                    let location = c.location();
                    (c.id, location)
                })
                .collect();
            for id in chunk {
                let location = by_id.remove(id);
                self.locations.insert(id.clone(), location);
            }
        }

        debug!(prefetched = ids.len(), "warmed component location cache");
        Ok(ids.len())
    }

    /// Location of component `id`; `None` if it no longer exists.
    pub async fn component_location(&mut self, id: &str) -> Result<Option<ComponentLocation>> {
        if let Some(cached) = self.locations.get(id) {
            self.metrics.location_hits += 1;
            return Ok(cached.clone());
        }
        self.metrics.location_misses += 1;
        let location = self
            .components
            .get_component(id)
            .await?
            .map(|c| c.location());
        self.locations.insert(id.to_string(), location.clone());
        Ok(location)
    }

    /// Component id of the file at `path`, preferring `file` components.
    pub async fn get_file_id_cached(&mut self, path: &str) -> Result<Option<String>> {
        if let Some(cached) = self.file_ids.get(path) {
            self.metrics.file_id_hits += 1;
            return Ok(cached.clone());
        }
        self.metrics.file_id_misses += 1;
        let key = vec![path.to_string()];
        let id = self.components.ids_by_file_paths(&key).await?.remove(path);
        self.file_ids.insert(path.to_string(), id.clone());
        Ok(id)
    }

    /// Component id for an exact `name`, only when exactly one component
    /// carries it.
    pub async fn get_name_id_cached(&mut self, name: &str) -> Result<Option<String>> {
        if let Some(cached) = self.name_ids.get(name) {
            self.metrics.name_id_hits += 1;
            return Ok(cached.clone());
        }
        self.metrics.name_id_misses += 1;
        let key = vec![name.to_string()];
        let id = match self.components.ids_by_names(&key).await?.remove(name) {
            Some(ids) if ids.len() == 1 => ids.into_iter().next(),
            _ => None,
        };
        self.name_ids.insert(name.to_string(), id.clone());
        Ok(id)
    }

    /// Whether `path` exists on disk, asking the filesystem once per path.
    pub async fn get_fs_exists_cached(&mut self, path: &Path) -> bool {
        if let Some(exists) = self.fs_exists.get(path) {
            self.metrics.fs_exists_hits += 1;
            return *exists;
        }
        self.metrics.fs_exists_misses += 1;
        let exists = self.fs.exists(path).await;
        self.fs_exists.insert(path.to_path_buf(), exists);
        exists
    }

    /// Uncached name search, used only for external-guess fallbacks.
    pub async fn search_components(&self, query: &ComponentQuery) -> Result<Vec<Component>> {
        self.components.search_components(query).await
    }

    /// The composer autoload rules of the project, read on first use. A
    /// missing or unreadable manifest yields an empty resolver.
    pub async fn composer_resolver(&mut self) -> &ComposerResolver {
        if self.composer.is_none() {
            let loaded = self.load_composer().await;
            self.composer = Some(loaded);
        }
        self.composer.get_or_insert_with(ComposerResolver::default)
    }

    async fn load_composer(&self) -> ComposerResolver {
        let root = self.fs.project_root().to_path_buf();
        let manifest = root.join(&self.config.composer_file);
        let Some(contents) = self.fs.read_to_string(&manifest).await else {
            return ComposerResolver::default();
        };
        let base_dir = manifest.parent().map(Path::to_path_buf).unwrap_or(root);
        match ComposerResolver::from_manifest(&contents, &base_dir) {
            Ok(resolver) => {
                if resolver.is_empty() {
                    debug!(path = %manifest.display(), "composer manifest has no psr-4 or psr-0 rules");
                }
                resolver
            }
            Err(e) => {
                warn!(path = %manifest.display(), error = %e, "ignoring composer manifest");
                ComposerResolver::default()
            }
        }
    }

    pub fn queue_target_update(&mut self, patch: RelationshipPatch) {
        self.target_updates.push(patch);
    }

    pub fn queue_source_update(&mut self, patch: RelationshipPatch) {
        self.source_updates.push(patch);
    }

    pub fn pending_updates(&self) -> usize {
        self.target_updates.len() + self.source_updates.len()
    }

    /// Takes both queues, leaving them empty.
    pub fn drain_updates(&mut self) -> (Vec<RelationshipPatch>, Vec<RelationshipPatch>) {
        (
            std::mem::take(&mut self.target_updates),
            std::mem::take(&mut self.source_updates),
        )
    }

    /// Records a confirmed flush of `targets` + `sources` patches.
    pub fn record_flush(&mut self, targets: usize, sources: usize) {
        self.metrics.flushes += 1;
        self.metrics.targets_patched += targets as u64;
        self.metrics.sources_patched += sources as u64;
    }

    pub fn record_flush_failure(&mut self) {
        self.metrics.flush_failures += 1;
    }
}
