use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graphlink::config::LinkConfig;
use graphlink::errors::{LinkError, Result};
use graphlink::resolution::{RelationshipResolver, ResolveScheduler, SchedulerPhase};
use graphlink::store::{MemoryFileSystem, MemoryStore, RelationshipRepository};
use graphlink::types::*;
use tokio::sync::{Notify, Semaphore};

/// Holds every pass at `get_unresolved_targets` until released.
struct GatedStore {
    inner: Arc<MemoryStore>,
    entered: Notify,
    release: Semaphore,
}

#[async_trait]
impl RelationshipRepository for GatedStore {
    async fn ensure_indexes(&self) -> Result<()> {
        self.inner.ensure_indexes().await
    }

    async fn get_unresolved_targets(&self) -> Result<Vec<Relationship>> {
        self.entered.notify_one();
        self.release
            .acquire()
            .await
            .expect("semaphore closed")
            .forget();
        self.inner.get_unresolved_targets().await
    }

    async fn get_unresolved_sources(&self) -> Result<Vec<Relationship>> {
        self.inner.get_unresolved_sources().await
    }

    async fn update_relationships_bulk(&self, patches: &[RelationshipPatch]) -> Result<usize> {
        self.inner.update_relationships_bulk(patches).await
    }
}

/// Fails every read.
struct BrokenStore;

#[async_trait]
impl RelationshipRepository for BrokenStore {
    async fn ensure_indexes(&self) -> Result<()> {
        Err(LinkError::database("ensure_indexes", "offline"))
    }

    async fn get_unresolved_targets(&self) -> Result<Vec<Relationship>> {
        Err(LinkError::database("get_unresolved_targets", "offline"))
    }

    async fn get_unresolved_sources(&self) -> Result<Vec<Relationship>> {
        Err(LinkError::database("get_unresolved_sources", "offline"))
    }

    async fn update_relationships_bulk(&self, _patches: &[RelationshipPatch]) -> Result<usize> {
        Err(LinkError::database("update_relationships_bulk", "offline"))
    }
}

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_components(vec![Component {
            id: "comp-main".to_string(),
            name: "main.js".to_string(),
            kind: "file".to_string(),
            file_path: "src/main.js".to_string(),
            language: Language::JavaScript,
        }])
        .await;
    store
        .insert_relationships(vec![RawRelationship::new(
            "rel-lodash",
            "imports",
            "comp-main",
            "lodash",
        )])
        .await;
    store
}

fn fs() -> Arc<MemoryFileSystem> {
    Arc::new(MemoryFileSystem::new(Path::new("/proj")))
}

fn scheduler_for(store: &Arc<MemoryStore>, debounce_ms: u64) -> ResolveScheduler {
    let resolver = RelationshipResolver::new(store.clone(), store.clone(), fs(), LinkConfig::default());
    ResolveScheduler::with_debounce(resolver, Duration::from_millis(debounce_ms))
}

#[tokio::test(start_paused = true)]
async fn test_schedule_calls_within_the_window_coalesce() {
    let store = seeded_store().await;
    let scheduler = scheduler_for(&store, 100);

    scheduler.schedule();
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.schedule();
    tokio::time::sleep(Duration::from_millis(60)).await;

    // The second call pushed the deadline to t=150.
    assert_eq!(scheduler.passes_completed(), 0);
    assert_eq!(scheduler.phase(), SchedulerPhase::Scheduled);

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(scheduler.passes_completed(), 1);
    assert_eq!(store.target_fetches(), 1);
    assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
    let summary = scheduler.last_summary().expect("pass should have succeeded");
    assert_eq!(summary.targets.skipped_external, 1);
}

#[tokio::test(start_paused = true)]
async fn test_resolve_skips_the_debounce_window() {
    let store = seeded_store().await;
    let scheduler = scheduler_for(&store, 60_000);

    scheduler.schedule();
    let summary = scheduler.resolve().await.expect("pass should succeed");

    assert_eq!(summary.targets.skipped_external, 1);
    assert_eq!(scheduler.passes_completed(), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(scheduler.passes_completed(), 1, "pending schedule was covered");
}

#[tokio::test(start_paused = true)]
async fn test_requests_during_a_pass_collapse_into_one_rerun() {
    let store = seeded_store().await;
    let gated = Arc::new(GatedStore {
        inner: store.clone(),
        entered: Notify::new(),
        release: Semaphore::new(0),
    });
    let resolver = RelationshipResolver::new(gated.clone(), store.clone(), fs(), LinkConfig::default());
    let scheduler = ResolveScheduler::with_debounce(resolver, Duration::from_millis(10));

    let first = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.resolve().await })
    };
    gated.entered.notified().await;
    assert_eq!(scheduler.phase(), SchedulerPhase::Running);

    scheduler.schedule();
    scheduler.schedule();
    let second = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.resolve().await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(scheduler.phase(), SchedulerPhase::RunningWithRerun);

    gated.release.add_permits(10);
    assert!(first.await.unwrap().is_some());
    assert!(second.await.unwrap().is_some());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(scheduler.passes_completed(), 2);
    assert_eq!(store.target_fetches(), 2);
    assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_failed_pass_is_contained() {
    let store = seeded_store().await;
    let resolver =
        RelationshipResolver::new(Arc::new(BrokenStore), store.clone(), fs(), LinkConfig::default());
    let scheduler = ResolveScheduler::with_debounce(resolver, Duration::from_millis(10));

    assert!(scheduler.resolve().await.is_none());
    assert_eq!(scheduler.phase(), SchedulerPhase::Idle);

    assert!(scheduler.resolve().await.is_none());
    assert_eq!(scheduler.passes_completed(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_default_debounce_comes_from_config() {
    let store = seeded_store().await;
    let config = LinkConfig {
        debounce_ms: 500,
        ..LinkConfig::default()
    };
    let resolver = RelationshipResolver::new(store.clone(), store.clone(), fs(), config);
    let scheduler = ResolveScheduler::new(resolver);

    scheduler.schedule();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(scheduler.passes_completed(), 0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(scheduler.passes_completed(), 1);
}
