use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{get_graphlink_dir, load_config, save_config, LinkConfig};
use crate::db::Database;
use crate::errors::{LinkError, Result};
use crate::resolution::{RelationshipResolver, ResolveScheduler, SchedulerPhase};
use crate::store::{LocalFileSystem, WriteGate};
use crate::types::*;

/// File name of the database inside the `.graphlink` directory.
pub const DATABASE_FILENAME: &str = "graph.db";

/// Parser output as exchanged on disk: components plus the relationships
/// that reference them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphBatch {
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub relationships: Vec<RawRelationship>,
}

/// Central entry point tying storage, configuration and resolution together
/// for one project.
pub struct GraphLink {
    db: Arc<Database>,
    config: LinkConfig,
    project_root: PathBuf,
    gate: Arc<WriteGate>,
    scheduler: ResolveScheduler,
}

fn database_path(project_root: &Path) -> PathBuf {
    get_graphlink_dir(project_root).join(DATABASE_FILENAME)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

impl GraphLink {
    /// Initializes a new project at the given root.
    ///
    /// Creates the `.graphlink` directory, writes a default configuration,
    /// and initializes a fresh database.
    pub async fn init(project_root: &Path) -> Result<Self> {
        let config = LinkConfig {
            root_dir: project_root.to_string_lossy().to_string(),
            ..LinkConfig::default()
        };
        save_config(project_root, &config)?;

        let db = Database::initialize(&database_path(project_root)).await?;
        Ok(Self::assemble(db, config, project_root))
    }

    /// Opens an existing project at the given root.
    ///
    /// Loads the configuration from disk, applies environment overrides and
    /// opens the existing database.
    pub async fn open(project_root: &Path) -> Result<Self> {
        let config = load_config(project_root)?.with_env_overrides();
        let db_path = database_path(project_root);

        if !db_path.exists() {
            return Err(LinkError::Config {
                message: format!(
                    "no graphlink database found at '{}'; run 'graphlink init' first",
                    db_path.display()
                ),
            });
        }

        let db = Database::open(&db_path).await?;
        Ok(Self::assemble(db, config, project_root))
    }

    /// Returns `true` if a project has been initialized at the given root.
    pub fn is_initialized(project_root: &Path) -> bool {
        database_path(project_root).exists()
    }

    fn assemble(db: Database, config: LinkConfig, project_root: &Path) -> Self {
        let db = Arc::new(db);
        let gate = Arc::new(WriteGate::new());
        let resolver = RelationshipResolver::new(
            db.clone(),
            db.clone(),
            Arc::new(LocalFileSystem::new(project_root)),
            config.clone(),
        )
        .with_write_gate(Arc::clone(&gate));

        Self {
            db,
            config,
            project_root: project_root.to_path_buf(),
            gate,
            scheduler: ResolveScheduler::new(resolver),
        }
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

impl GraphLink {
    /// Stores components. Changed components can make earlier placeholders
    /// resolvable, so a pass is scheduled.
    pub async fn store_components(&self, components: &[Component]) -> Result<()> {
        self.gate.run(self.db.insert_components(components)).await?;
        self.scheduler.schedule();
        Ok(())
    }

    /// Stores relationships and schedules a pass to resolve them.
    pub async fn store_relationships(&self, relationships: &[RawRelationship]) -> Result<()> {
        self.gate
            .run(self.db.insert_relationships(relationships))
            .await?;
        self.scheduler.schedule();
        Ok(())
    }

    /// Stores a full parser batch, components first.
    pub async fn store_batch(&self, batch: &GraphBatch) -> Result<()> {
        self.gate
            .run(async {
                self.db.insert_components(&batch.components).await?;
                self.db.insert_relationships(&batch.relationships).await
            })
            .await?;
        info!(
            components = batch.components.len(),
            relationships = batch.relationships.len(),
            "stored parser batch"
        );
        self.scheduler.schedule();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

impl GraphLink {
    /// Requests a debounced resolution pass.
    pub fn schedule(&self) {
        self.scheduler.schedule();
    }

    /// Runs a pass now and waits for it. `None` if the pass failed.
    pub async fn resolve_now(&self) -> Option<PassSummary> {
        self.scheduler.resolve().await
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.scheduler.phase()
    }

    /// Counts of relationships still waiting for resolution.
    pub async fn status(&self) -> Result<UnresolvedCounts> {
        self.db.unresolved_counts().await
    }

    /// Returns a stored relationship with its current resolution state.
    pub async fn get_relationship(&self, id: &str) -> Result<Option<RawRelationship>> {
        self.db.get_relationship(id).await
    }

    /// Removes every component and relationship.
    pub async fn clear(&self) -> Result<()> {
        self.gate.run(self.db.clear()).await
    }

    pub fn get_config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}
