use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::batch::ItemResolver;
use super::context::ResolutionContext;
use super::locate::{external_metadata, internal_metadata, locate_specifier, Anchor, Located};
use super::source::{find_internal_match, guess_sentinel};
use crate::errors::Result;
use crate::types::*;

/// Resolves placeholder targets relative to the file their source lives in.
///
/// Decision order for a specifier target:
/// 1. Blank or already-concrete targets are junk.
/// 2. The source must still exist; its file anchors relative lookups.
/// 3. Relative specifiers try extension and index-file candidates.
/// 4. Stdlib names become `stdlib:` sentinels.
/// 5. Namespaces go through the composer autoload rules, then become
///    `external-namespace:` sentinels.
/// 6. Bare specifiers try project module layouts, then become
///    `external-module:` sentinels keyed by package root.
/// 7. Missing paths matching the ignore list are ignored.
/// 8. Anything else stays unresolved for a later pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct TargetResolutionEngine;

impl TargetResolutionEngine {
    pub fn new() -> Self {
        Self
    }

    pub async fn resolve(
        &self,
        ctx: &mut ResolutionContext<'_>,
        relationship: &Relationship,
    ) -> ResolutionStatus {
        match self.try_resolve(ctx, relationship).await {
            Ok(status) => status,
            Err(e) => {
                debug!(relationship = %relationship.id, error = %e, "target resolution failed");
                ResolutionStatus::Unresolved
            }
        }
    }

    async fn try_resolve(
        &self,
        ctx: &mut ResolutionContext<'_>,
        rel: &Relationship,
    ) -> Result<ResolutionStatus> {
        let spec = match &rel.target {
            Endpoint::BySpecifier(spec) if !spec.trim().is_empty() => spec.as_str(),
            Endpoint::ExternalGuess(fragment) => return self.resolve_guess(ctx, rel, fragment).await,
            _ => return Ok(ResolutionStatus::SkippedJunk),
        };

        let Some(source_id) = rel.source.component_id() else {
            return Ok(ResolutionStatus::Unresolved);
        };
        let Some(location) = ctx.component_location(source_id).await? else {
            return Ok(ResolutionStatus::Unresolved);
        };

        Ok(match locate_specifier(ctx, spec, &Anchor::at(&location)).await? {
            Located::Internal { id, path } => {
                queue(ctx, rel, id, internal_metadata("path", Some(&path)));
                ResolutionStatus::Resolved
            }
            Located::External(ext) => {
                queue(ctx, rel, ext.sentinel_id(), external_metadata(&ext));
                ResolutionStatus::SkippedExternal
            }
            Located::Stdlib(ext) => {
                queue(ctx, rel, ext.sentinel_id(), external_metadata(&ext));
                ResolutionStatus::SkippedStdlib
            }
            Located::Ignored => ResolutionStatus::SkippedIgnored,
            Located::Unresolved => ResolutionStatus::Unresolved,
        })
    }

    async fn resolve_guess(
        &self,
        ctx: &mut ResolutionContext<'_>,
        rel: &Relationship,
        fragment: &str,
    ) -> Result<ResolutionStatus> {
        if ctx.is_ignored(fragment) {
            return Ok(ResolutionStatus::SkippedIgnored);
        }
        if let Some(id) = find_internal_match(ctx, fragment).await? {
            queue(ctx, rel, id, internal_metadata("name-match", None));
            return Ok(ResolutionStatus::Resolved);
        }
        let ext = guess_sentinel(fragment);
        queue(ctx, rel, ext.sentinel_id(), external_metadata(&ext));
        Ok(ResolutionStatus::SkippedExternal)
    }
}

fn queue(
    ctx: &mut ResolutionContext<'_>,
    rel: &Relationship,
    resolved_id: String,
    additions: Map<String, Value>,
) {
    ctx.queue_target_update(RelationshipPatch {
        relationship_id: rel.id.clone(),
        resolved_target_id: Some(resolved_id),
        resolved_source_id: None,
        metadata: merge_metadata(&rel.metadata, additions),
    });
}

#[async_trait]
impl ItemResolver for TargetResolutionEngine {
    async fn resolve_one(
        &self,
        ctx: &mut ResolutionContext<'_>,
        relationship: &Relationship,
    ) -> ResolutionStatus {
        self.resolve(ctx, relationship).await
    }
}
