use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::batch::{process_in_batches, BatchBoundary, PatchFlusher};
use super::context::ResolutionContext;
use super::source::SourceResolutionEngine;
use super::target::TargetResolutionEngine;
use crate::config::LinkConfig;
use crate::errors::Result;
use crate::store::{ComponentRepository, FileSystem, RelationshipRepository, WriteGate};
use crate::types::*;

/// Runs complete resolution passes over everything still unresolved.
///
/// A pass reads both unresolved sets up front, warms the location cache,
/// resolves targets then sources in batches, and flushes patches at every
/// batch boundary. Each pass starts from a fresh [`ResolutionContext`].
pub struct RelationshipResolver {
    relationships: Arc<dyn RelationshipRepository>,
    components: Arc<dyn ComponentRepository>,
    fs: Arc<dyn FileSystem>,
    gate: Arc<WriteGate>,
    config: LinkConfig,
}

impl RelationshipResolver {
    pub fn new(
        relationships: Arc<dyn RelationshipRepository>,
        components: Arc<dyn ComponentRepository>,
        fs: Arc<dyn FileSystem>,
        config: LinkConfig,
    ) -> Self {
        Self {
            relationships,
            components,
            fs,
            gate: Arc::new(WriteGate::new()),
            config,
        }
    }

    /// Shares `gate` with other writers of the same store.
    pub fn with_write_gate(mut self, gate: Arc<WriteGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Runs one full pass.
    ///
    /// Fails only when the unresolved sets cannot be read. Index creation
    /// and prefetch failures are logged and the pass continues; flush
    /// failures are counted in the summary's metrics.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let start = Instant::now();
        let mut ctx =
            ResolutionContext::new(self.components.as_ref(), self.fs.as_ref(), &self.config);

        if let Err(e) = self.relationships.ensure_indexes().await {
            warn!(error = %e, "failed to ensure relationship indexes");
        }

        let (targets, sources) = tokio::join!(
            self.relationships.get_unresolved_targets(),
            self.relationships.get_unresolved_sources()
        );
        let targets = targets?;
        let sources = sources?;

        if let Err(e) = ctx.prefetch_lookups(&targets).await {
            warn!(error = %e, "failed to prefetch component locations");
        }

        let flusher = PatchFlusher::new(self.relationships.as_ref(), &self.gate);
        let batch_size = self.config.effective_batch_size();

        let target_statuses = process_in_batches(
            &targets,
            batch_size,
            &mut ctx,
            &TargetResolutionEngine::new(),
            &flusher,
        )
        .await;
        let source_statuses = process_in_batches(
            &sources,
            batch_size,
            &mut ctx,
            &SourceResolutionEngine::new(),
            &flusher,
        )
        .await;
        flusher.on_batch_boundary(&mut ctx).await;

        let summary = PassSummary {
            targets: StatusCounts::from_statuses(&target_statuses),
            sources: StatusCounts::from_statuses(&source_statuses),
            metrics: ctx.metrics().clone(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        log_summary(&summary);
        Ok(summary)
    }
}

fn log_summary(summary: &PassSummary) {
    let t = &summary.targets;
    let s = &summary.sources;
    let m = &summary.metrics;
    info!(
        targets = t.total(),
        targets_resolved = t.resolved,
        targets_external = t.skipped_external,
        targets_stdlib = t.skipped_stdlib,
        targets_ignored = t.skipped_ignored,
        targets_junk = t.skipped_junk,
        targets_unresolved = t.unresolved,
        sources = s.total(),
        sources_resolved = s.resolved,
        sources_external = s.skipped_external,
        sources_unresolved = s.unresolved,
        patched = summary.patched(),
        flushes = m.flushes,
        flush_failures = m.flush_failures,
        file_id_hit_ratio = hit_ratio(m.file_id_hits, m.file_id_misses),
        name_id_hit_ratio = hit_ratio(m.name_id_hits, m.name_id_misses),
        fs_exists_hit_ratio = hit_ratio(m.fs_exists_hits, m.fs_exists_misses),
        location_hit_ratio = hit_ratio(m.location_hits, m.location_misses),
        duration_ms = summary.duration_ms,
        "relationship resolution pass complete"
    );
}
