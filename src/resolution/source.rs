use async_trait::async_trait;
use tracing::debug;

use super::batch::ItemResolver;
use super::context::ResolutionContext;
use super::locate::{external_metadata, internal_metadata, locate_specifier, Anchor, Located};
use super::specifier::fragment_stem;
use crate::errors::Result;
use crate::types::*;

/// Upper bound on components considered for one external-guess fragment.
const GUESS_SEARCH_LIMIT: usize = 50;

/// Resolves placeholder sources into component ids or sentinels.
///
/// A source can only end up resolved, external or unresolved: sources are
/// never classified as stdlib, ignored or junk.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceResolutionEngine;

impl SourceResolutionEngine {
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
                debug!(relationship = %relationship.id, error = %e, "source resolution failed");
                ResolutionStatus::Unresolved
            }
        }
    }

    async fn try_resolve(
        &self,
        ctx: &mut ResolutionContext<'_>,
        rel: &Relationship,
    ) -> Result<ResolutionStatus> {
        match &rel.source {
            Endpoint::BySpecifier(spec) if !spec.trim().is_empty() => {
                let anchor = match rel.target.component_id() {
                    Some(target_id) => ctx.component_location(target_id).await?.map(|l| Anchor::at(&l)),
                    None => None,
                }
                .unwrap_or_else(|| Anchor::project_root(Language::from_path(spec)));

                match locate_specifier(ctx, spec, &anchor).await? {
                    Located::Internal { id, path } => {
                        queue(ctx, rel, id, internal_metadata("path", Some(&path)));
                        Ok(ResolutionStatus::Resolved)
                    }
                    Located::External(ext) | Located::Stdlib(ext) => {
                        queue(ctx, rel, ext.sentinel_id(), external_metadata(&ext));
                        Ok(ResolutionStatus::SkippedExternal)
                    }
                    Located::Ignored | Located::Unresolved => Ok(ResolutionStatus::Unresolved),
                }
            }
            Endpoint::ExternalGuess(fragment) => {
                if let Some(id) = find_internal_match(ctx, fragment).await? {
                    queue(ctx, rel, id, internal_metadata("name-match", None));
                    return Ok(ResolutionStatus::Resolved);
                }
                let ext = guess_sentinel(fragment);
                queue(ctx, rel, ext.sentinel_id(), external_metadata(&ext));
                Ok(ResolutionStatus::SkippedExternal)
            }
            _ => Ok(ResolutionStatus::Unresolved),
        }
    }
}

fn queue(
    ctx: &mut ResolutionContext<'_>,
    rel: &Relationship,
    resolved_id: String,
    additions: serde_json::Map<String, serde_json::Value>,
) {
    ctx.queue_source_update(RelationshipPatch {
        relationship_id: rel.id.clone(),
        resolved_target_id: None,
        resolved_source_id: Some(resolved_id),
        metadata: merge_metadata(&rel.metadata, additions),
    });
}

#[async_trait]
impl ItemResolver for SourceResolutionEngine {
    async fn resolve_one(
        &self,
        ctx: &mut ResolutionContext<'_>,
        relationship: &Relationship,
    ) -> ResolutionStatus {
        self.resolve(ctx, relationship).await
    }
}

/// Sentinel for a fragment no project component matches.
pub(crate) fn guess_sentinel(fragment: &str) -> ExternalRef {
    let ecosystem = Language::from_path(fragment).ecosystem().unwrap_or("unknown");
    let name = fragment.trim().trim_start_matches("./").trim_start_matches('/');
    ExternalRef::package(ecosystem, name)
}

/// Finds the project component a loose path fragment most likely names.
///
/// An exact, unique name hit wins outright; otherwise a name search is
/// ranked by [`best_guess`].
pub(crate) async fn find_internal_match(
    ctx: &mut ResolutionContext<'_>,
    fragment: &str,
) -> Result<Option<String>> {
    let stem = fragment_stem(fragment.trim());
    if stem.is_empty() {
        return Ok(None);
    }
    if let Some(id) = ctx.get_name_id_cached(stem).await? {
        return Ok(Some(id));
    }

    let query = ComponentQuery {
        name_contains: stem.to_string(),
        language: None,
        limit: GUESS_SEARCH_LIMIT,
    };
    let candidates = ctx.search_components(&query).await?;
    Ok(best_guess(stem, fragment, &candidates).map(|c| c.id.clone()))
}

/// Scores candidates for a fragment and returns the best match.
///
/// Scoring heuristics:
/// - Exact name: +100, case-insensitive name: +60
/// - File stem equals the fragment stem: +40
/// - Name merely contains the stem: +10 (stems of three or more chars only)
/// - Each trailing directory shared with the fragment: +5
/// - Whole-file component: +3
///
/// Ties go to the shorter name, then the lower id.
pub fn best_guess<'c>(stem: &str, fragment: &str, candidates: &'c [Component]) -> Option<&'c Component> {
    let fragment_dirs: Vec<&str> = fragment
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect();
    let fragment_dirs = &fragment_dirs[..fragment_dirs.len().saturating_sub(1)];

    let mut best: Option<(i64, &Component)> = None;

    for component in candidates {
        let mut score: i64 = 0;

        if component.name == stem {
            score += 100;
        } else if component.name.eq_ignore_ascii_case(stem) {
            score += 60;
        } else if stem.len() >= 3 && component.name.to_lowercase().contains(&stem.to_lowercase()) {
            score += 10;
        }

        if fragment_stem(&component.file_path) == stem {
            score += 40;
        }

        if score == 0 {
            continue;
        }

        let component_dirs: Vec<&str> = component.file_path.split('/').collect();
        let component_dirs = &component_dirs[..component_dirs.len().saturating_sub(1)];
        let shared = fragment_dirs
            .iter()
            .rev()
            .zip(component_dirs.iter().rev())
            .take_while(|(a, b)| a == b)
            .count();
        score += 5 * shared as i64;

        if component.is_file() {
            score += 3;
        }

        let better = match best {
            None => true,
            Some((best_score, current)) => {
                score > best_score
                    || (score == best_score
                        && (component.name.len(), &component.id) < (current.name.len(), &current.id))
            }
        };
        if better {
            best = Some((score, component));
        }
    }

    best.map(|(_, component)| component)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(id: &str, name: &str, file_path: &str) -> Component {
        Component {
            id: id.to_string(),
            name: name.to_string(),
            kind: "class".to_string(),
            file_path: file_path.to_string(),
            language: Language::Python,
        }
    }

    #[test]
    fn exact_name_beats_substring() {
        let candidates = vec![
            component("a", "GraphBuilder", "lib/builder.py"),
            component("b", "Graph", "lib/graph.py"),
        ];
        let best = best_guess("Graph", "vendor/lib/Graph.py", &candidates).unwrap();
        assert_eq!(best.id, "b");
    }

    #[test]
    fn shared_directories_break_ties() {
        let candidates = vec![
            component("a", "utils", "other/utils.py"),
            component("b", "utils", "core/lib/utils.py"),
        ];
        let best = best_guess("utils", "pkg/core/lib/utils.py", &candidates).unwrap();
        assert_eq!(best.id, "b");
    }

    #[test]
    fn short_stems_need_more_than_a_substring() {
        let candidates = vec![component("a", "Graph", "lib/graph.py")];
        assert!(best_guess("ap", "x/ap.py", &candidates).is_none());
    }
}
