//! Turns a specifier plus an anchor file into a concrete outcome. Shared by
//! the target and source engines.

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use super::context::ResolutionContext;
use super::specifier::{self, SpecifierKind};
use super::stdlib::stdlib_name;
use crate::errors::Result;
use crate::types::*;

/// Where a specifier is read from.
#[derive(Debug, Clone)]
pub(crate) struct Anchor {
    /// File the specifier was written in; `None` anchors at the project root.
    pub file: Option<PathBuf>,
    pub language: Language,
}

impl Anchor {
    pub fn at(location: &ComponentLocation) -> Self {
        Self {
            file: Some(PathBuf::from(&location.file_path)),
            language: location.language,
        }
    }

    pub fn project_root(language: Language) -> Self {
        Self {
            file: None,
            language,
        }
    }
}

/// What a specifier turned out to name.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Located {
    Internal { id: String, path: String },
    External(ExternalRef),
    Stdlib(ExternalRef),
    Ignored,
    Unresolved,
}

enum FileMatch {
    Indexed { id: String, path: String },
    NotIndexed,
    Missing,
}

pub(crate) async fn locate_specifier(
    ctx: &mut ResolutionContext<'_>,
    spec: &str,
    anchor: &Anchor,
) -> Result<Located> {
    let spec = spec.trim();
    let language = anchor.language;
    let root = ctx.project_root().to_path_buf();
    // Relative specifiers resolve against the anchor's directory; a
    // root-anchored specifier behaves as if written in a file at the root.
    let anchor_file = anchor
        .file
        .as_ref()
        .map(|f| absolute(&root, f))
        .unwrap_or_else(|| root.join("_"));

    match specifier::classify(spec, language) {
        SpecifierKind::Relative => {
            let candidates = specifier::relative_candidates(spec, &anchor_file, language);
            settle_paths(ctx, &candidates, spec).await
        }
        SpecifierKind::Alias => {
            let candidates = specifier::alias_candidates(spec, &root, language);
            settle_paths(ctx, &candidates, spec).await
        }
        SpecifierKind::Namespace => {
            if let Some(name) = stdlib_name(spec, language) {
                return Ok(Located::Stdlib(ExternalRef::stdlib(language, &name)));
            }
            let candidates = ctx.composer_resolver().await.candidates(spec);
            if let FileMatch::Indexed { id, path } = match_file(ctx, &candidates).await? {
                return Ok(Located::Internal { id, path });
            }
            let ecosystem = language.ecosystem().unwrap_or("composer");
            Ok(Located::External(ExternalRef::namespace(
                ecosystem,
                spec.trim_start_matches('\\'),
            )))
        }
        SpecifierKind::Bare => {
            if let Some(name) = stdlib_name(spec, language) {
                return Ok(Located::Stdlib(ExternalRef::stdlib(language, &name)));
            }
            let candidates = specifier::project_module_candidates(
                spec,
                anchor.file.as_ref().map(|_| anchor_file.as_path()),
                &root,
                language,
            );
            if let FileMatch::Indexed { id, path } = match_file(ctx, &candidates).await? {
                return Ok(Located::Internal { id, path });
            }
            match language.ecosystem() {
                Some(ecosystem) => Ok(Located::External(ExternalRef::package(
                    ecosystem,
                    &specifier::package_root(spec, language),
                ))),
                None if ctx.is_ignored(spec) => Ok(Located::Ignored),
                None => Ok(Located::Unresolved),
            }
        }
        SpecifierKind::Other if ctx.is_ignored(spec) => Ok(Located::Ignored),
        SpecifierKind::Other => Ok(Located::Unresolved),
    }
}

/// Outcome for path candidates: the first existing file decides. Missing
/// files under an ignored path are ignored rather than unresolved.
async fn settle_paths(
    ctx: &mut ResolutionContext<'_>,
    candidates: &[PathBuf],
    spec: &str,
) -> Result<Located> {
    match match_file(ctx, candidates).await? {
        FileMatch::Indexed { id, path } => Ok(Located::Internal { id, path }),
        FileMatch::NotIndexed => Ok(Located::Unresolved),
        FileMatch::Missing => {
            let ignored = ctx.is_ignored(spec)
                || candidates
                    .iter()
                    .any(|c| ctx.is_ignored(&c.to_string_lossy()));
            Ok(if ignored {
                Located::Ignored
            } else {
                Located::Unresolved
            })
        }
    }
}

async fn match_file(ctx: &mut ResolutionContext<'_>, candidates: &[PathBuf]) -> Result<FileMatch> {
    for candidate in candidates {
        if !ctx.get_fs_exists_cached(candidate).await {
            continue;
        }
        let path = project_relative(ctx.project_root(), candidate);
        let mut id = ctx.get_file_id_cached(&path).await?;
        if id.is_none() && path != candidate.to_string_lossy() {
            // Some indexers record absolute file paths.
            id = ctx.get_file_id_cached(&candidate.to_string_lossy()).await?;
        }
        return Ok(match id {
            Some(id) => FileMatch::Indexed { id, path },
            None => FileMatch::NotIndexed,
        });
    }
    Ok(FileMatch::Missing)
}

/// Root-relative form of a candidate path with `/` separators, the form most
/// indexers store in `file_path`.
fn project_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn absolute(root: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    }
}

/// Metadata recorded next to an internal match.
pub(crate) fn internal_metadata(resolved_by: &str, path: Option<&str>) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("isExternal".to_string(), Value::Bool(false));
    meta.insert("resolvedBy".to_string(), json!(resolved_by));
    if let Some(path) = path {
        meta.insert("resolvedPath".to_string(), json!(path));
    }
    meta
}

/// Metadata recorded next to an external or stdlib sentinel.
pub(crate) fn external_metadata(external: &ExternalRef) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("isExternal".to_string(), Value::Bool(true));
    meta.insert("externalKind".to_string(), json!(external.origin.as_str()));
    meta.insert("externalName".to_string(), json!(external.name));
    meta
}
