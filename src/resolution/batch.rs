//! Chunked processing with a flush at every batch boundary.

use async_trait::async_trait;
use tracing::{debug, error};

use super::context::ResolutionContext;
use crate::store::{RelationshipRepository, WriteGate};
use crate::types::*;

/// Resolves one relationship, queueing any patch on the context.
#[async_trait]
pub trait ItemResolver: Send + Sync {
    async fn resolve_one(
        &self,
        ctx: &mut ResolutionContext<'_>,
        relationship: &Relationship,
    ) -> ResolutionStatus;
}

/// Runs after every batch, including a short final one.
#[async_trait]
pub trait BatchBoundary: Send + Sync {
    async fn on_batch_boundary(&self, ctx: &mut ResolutionContext<'_>);
}

/// Resolves `items` in chunks of `batch_size`, calling `boundary` after each
/// chunk. Returns one status per item, in order.
pub async fn process_in_batches(
    items: &[Relationship],
    batch_size: usize,
    ctx: &mut ResolutionContext<'_>,
    resolver: &dyn ItemResolver,
    boundary: &dyn BatchBoundary,
) -> Vec<ResolutionStatus> {
    let mut statuses = Vec::with_capacity(items.len());
    for (index, chunk) in items.chunks(batch_size.max(1)).enumerate() {
        for item in chunk {
            statuses.push(resolver.resolve_one(ctx, item).await);
        }
        debug!(batch = index, size = chunk.len(), "batch resolved");
        boundary.on_batch_boundary(ctx).await;
    }
    statuses
}

/// Writes every queued patch in one bulk update under the write gate.
///
/// On failure the drained patches are dropped and the relationships stay
/// unresolved in storage, so the next pass picks them up again.
pub struct PatchFlusher<'a> {
    relationships: &'a dyn RelationshipRepository,
    gate: &'a WriteGate,
}

impl<'a> PatchFlusher<'a> {
    pub fn new(relationships: &'a dyn RelationshipRepository, gate: &'a WriteGate) -> Self {
        Self {
            relationships,
            gate,
        }
    }

    /// Flushes both queues. Returns `false` only when a write was attempted
    /// and failed.
    pub async fn flush(&self, ctx: &mut ResolutionContext<'_>) -> bool {
        let (targets, sources) = ctx.drain_updates();
        if targets.is_empty() && sources.is_empty() {
            return true;
        }

        let (target_count, source_count) = (targets.len(), sources.len());
        let mut patches = targets;
        patches.extend(sources);

        match self
            .gate
            .run(self.relationships.update_relationships_bulk(&patches))
            .await
        {
            Ok(updated) => {
                ctx.record_flush(target_count, source_count);
                debug!(
                    targets = target_count,
                    sources = source_count,
                    updated,
                    "flushed relationship patches"
                );
                true
            }
            Err(e) => {
                ctx.record_flush_failure();
                error!(
                    error = %e,
                    patches = patches.len(),
                    "failed to flush relationship patches; they will be retried next pass"
                );
                false
            }
        }
    }
}

#[async_trait]
impl BatchBoundary for PatchFlusher<'_> {
    async fn on_batch_boundary(&self, ctx: &mut ResolutionContext<'_>) {
        self.flush(ctx).await;
    }
}
