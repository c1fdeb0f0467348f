use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw-id prefix marking a "resolve by specifier" placeholder.
pub const SPECIFIER_PREFIX: &str = "resolve:";

/// Raw-id prefix marking an "external guess" placeholder carrying a loose
/// path fragment.
pub const EXTERNAL_GUESS_PREFIX: &str = "external:";

/// Component kind used for whole-file components.
pub const FILE_KIND: &str = "file";

/// Relationship kinds whose targets are module specifiers.
const IMPORT_KINDS: &[&str] = &[
    "imports", "import", "requires", "require", "uses", "use", "includes", "include",
];

/// Metadata keys a parser sets on import relationships.
const IMPORT_METADATA_KEYS: &[&str] = &["specifier", "importKind"];

/// Source languages known to the resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Php,
    Ruby,
    Go,
    Java,
    Kotlin,
    Rust,
    CSharp,
    #[default]
    Unknown,
}

#[allow(clippy::should_implement_trait)]
impl Language {
    /// Returns the string representation of this language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Go => "go",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Rust => "rust",
            Language::CSharp => "csharp",
            Language::Unknown => "unknown",
        }
    }

    /// Parses a language name or common alias. Unrecognized values map to
    /// `Language::Unknown`.
    pub fn from_str(s: &str) -> Language {
        match s.to_ascii_lowercase().as_str() {
            "typescript" | "ts" | "tsx" => Language::TypeScript,
            "javascript" | "js" | "jsx" => Language::JavaScript,
            "python" | "py" => Language::Python,
            "php" => Language::Php,
            "ruby" | "rb" => Language::Ruby,
            "go" | "golang" => Language::Go,
            "java" => Language::Java,
            "kotlin" | "kt" => Language::Kotlin,
            "rust" | "rs" => Language::Rust,
            "csharp" | "c#" | "cs" => Language::CSharp,
            _ => Language::Unknown,
        }
    }

    /// Infers the language from a file path's extension.
    pub fn from_path(path: &str) -> Language {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "py" | "pyi" => Language::Python,
            "php" => Language::Php,
            "rb" => Language::Ruby,
            "go" => Language::Go,
            "java" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "rs" => Language::Rust,
            "cs" => Language::CSharp,
            _ => Language::Unknown,
        }
    }

    /// Package ecosystem used to key external-module sentinels.
    pub fn ecosystem(&self) -> Option<&'static str> {
        match self {
            Language::TypeScript | Language::JavaScript => Some("npm"),
            Language::Python => Some("pypi"),
            Language::Php => Some("composer"),
            Language::Ruby => Some("gem"),
            Language::Go => Some("go"),
            Language::Java | Language::Kotlin => Some("maven"),
            Language::Rust => Some("cargo"),
            Language::CSharp => Some("nuget"),
            Language::Unknown => None,
        }
    }

    /// Extensions tried, in order, when a specifier names a project file.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript => &["ts", "tsx", "d.ts", "js", "jsx", "mjs", "cjs"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs", "ts", "tsx"],
            Language::Python => &["py", "pyi"],
            Language::Php => &["php"],
            Language::Ruby => &["rb"],
            Language::Go => &["go"],
            Language::Java => &["java"],
            Language::Kotlin => &["kt", "kts"],
            Language::Rust => &["rs"],
            Language::CSharp => &["cs"],
            Language::Unknown => &[],
        }
    }

    /// File stems that stand in for a directory when a specifier names one.
    pub fn index_files(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript | Language::JavaScript => &["index"],
            Language::Python => &["__init__"],
            Language::Rust => &["mod"],
            _ => &[],
        }
    }
}

/// A named code entity produced by upstream parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub file_path: String,
    pub language: Language,
}

impl Component {
    /// Returns `true` if this component represents a whole file.
    pub fn is_file(&self) -> bool {
        self.kind == FILE_KIND
    }

    /// The `{file_path, language}` pair resolution works relative to.
    pub fn location(&self) -> ComponentLocation {
        ComponentLocation {
            file_path: self.file_path.clone(),
            language: self.language,
        }
    }
}

/// Where a component lives; the anchor for relative resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLocation {
    pub file_path: String,
    pub language: Language,
}

/// Criteria for a name search over components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentQuery {
    /// Case-insensitive substring the component name must contain.
    pub name_contains: String,
    pub language: Option<Language>,
    pub limit: usize,
}

/// What kind of "outside the project" an external sentinel stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExternalOrigin {
    /// A third-party package from a registry.
    Package,
    /// A namespace no project file provides.
    Namespace,
    /// A standard-library module or symbol.
    Stdlib,
}

#[allow(clippy::should_implement_trait)]
impl ExternalOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalOrigin::Package => "external-module",
            ExternalOrigin::Namespace => "external-namespace",
            ExternalOrigin::Stdlib => "stdlib",
        }
    }

    pub fn from_str(s: &str) -> Option<ExternalOrigin> {
        match s {
            "external-module" => Some(ExternalOrigin::Package),
            "external-namespace" => Some(ExternalOrigin::Namespace),
            "stdlib" => Some(ExternalOrigin::Stdlib),
            _ => None,
        }
    }
}

/// A synthetic endpoint outside the indexed project. Never stored as a
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef {
    pub origin: ExternalOrigin,
    /// Ecosystem for packages and namespaces, language name for stdlib.
    pub ecosystem: String,
    pub name: String,
}

impl ExternalRef {
    pub fn package(ecosystem: &str, name: &str) -> Self {
        Self {
            origin: ExternalOrigin::Package,
            ecosystem: ecosystem.to_string(),
            name: name.to_string(),
        }
    }

    pub fn namespace(ecosystem: &str, name: &str) -> Self {
        Self {
            origin: ExternalOrigin::Namespace,
            ecosystem: ecosystem.to_string(),
            name: name.to_string(),
        }
    }

    pub fn stdlib(language: Language, name: &str) -> Self {
        Self {
            origin: ExternalOrigin::Stdlib,
            ecosystem: language.as_str().to_string(),
            name: name.to_string(),
        }
    }

    /// Sentinel id written to `resolved_*_id`, e.g. `external-module:npm:lodash`.
    pub fn sentinel_id(&self) -> String {
        format!("{}:{}:{}", self.origin.as_str(), self.ecosystem, self.name)
    }

    /// Parses a sentinel id. The name part may itself contain `:`.
    pub fn parse(raw: &str) -> Option<ExternalRef> {
        let mut parts = raw.splitn(3, ':');
        let origin = ExternalOrigin::from_str(parts.next()?)?;
        let ecosystem = parts.next()?;
        let name = parts.next()?;
        if ecosystem.is_empty() || name.is_empty() {
            return None;
        }
        Some(ExternalRef {
            origin,
            ecosystem: ecosystem.to_string(),
            name: name.to_string(),
        })
    }
}

/// A relationship endpoint, decoded once from its raw string id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endpoint {
    /// An existing component id.
    Resolved(String),
    /// A module or namespace specifier to resolve with project context.
    BySpecifier(String),
    /// A loosely known path fragment, probably outside the project.
    ExternalGuess(String),
    /// A sentinel already pointing outside the project.
    External(ExternalRef),
    /// An id that cannot be interpreted.
    Malformed(String),
}

impl Endpoint {
    /// Decodes a raw endpoint id. `is_component` tells whether the raw id
    /// names a stored component. An untagged id that does not is malformed:
    /// it most likely names a component that has since been deleted.
    pub fn decode(raw: &str, is_component: bool) -> Endpoint {
        Self::decode_untagged_as(raw, is_component, Endpoint::Malformed)
    }

    /// Like [`Endpoint::decode`], but an untagged id that names no component
    /// is read as a module specifier. Used for import targets, where parsers
    /// write `./foo` or `lodash` without a `resolve:` tag.
    pub fn decode_specifier(raw: &str, is_component: bool) -> Endpoint {
        Self::decode_untagged_as(raw, is_component, Endpoint::BySpecifier)
    }

    fn decode_untagged_as(raw: &str, is_component: bool, untagged: fn(String) -> Endpoint) -> Endpoint {
        if raw.trim().is_empty() {
            return Endpoint::Malformed(raw.to_string());
        }
        if let Some(ext) = ExternalRef::parse(raw) {
            return Endpoint::External(ext);
        }
        if let Some(spec) = raw.strip_prefix(SPECIFIER_PREFIX) {
            return tagged(spec, raw, Endpoint::BySpecifier);
        }
        if let Some(fragment) = raw.strip_prefix(EXTERNAL_GUESS_PREFIX) {
            return tagged(fragment, raw, Endpoint::ExternalGuess);
        }
        if is_component {
            Endpoint::Resolved(raw.to_string())
        } else {
            untagged(raw.to_string())
        }
    }

    /// Encodes the endpoint back to its canonical raw id.
    pub fn encode(&self) -> String {
        match self {
            Endpoint::Resolved(id) => id.clone(),
            Endpoint::BySpecifier(spec) => format!("{SPECIFIER_PREFIX}{spec}"),
            Endpoint::ExternalGuess(fragment) => format!("{EXTERNAL_GUESS_PREFIX}{fragment}"),
            Endpoint::External(ext) => ext.sentinel_id(),
            Endpoint::Malformed(raw) => raw.clone(),
        }
    }

    /// The component id, if this endpoint is concrete.
    pub fn component_id(&self) -> Option<&str> {
        match self {
            Endpoint::Resolved(id) => Some(id),
            _ => None,
        }
    }
}

fn tagged(payload: &str, raw: &str, make: fn(String) -> Endpoint) -> Endpoint {
    if payload.trim().is_empty() {
        Endpoint::Malformed(raw.to_string())
    } else {
        make(payload.to_string())
    }
}

/// Position of the reference in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// A relationship as the parser wrote it: endpoints are raw string ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelationship {
    pub id: String,
    pub kind: String,
    pub source_id: String,
    pub target_id: String,
    pub location: Option<Location>,
    pub metadata: Map<String, Value>,
    pub resolved_source_id: Option<String>,
    pub resolved_target_id: Option<String>,
}

impl RawRelationship {
    /// A fresh, unresolved relationship with empty metadata.
    pub fn new(id: &str, kind: &str, source_id: &str, target_id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            location: None,
            metadata: Map::new(),
            resolved_source_id: None,
            resolved_target_id: None,
        }
    }

    /// Whether the parser marked this relationship as an import, either by
    /// its kind or by import metadata. Only then is an untagged target a
    /// module specifier.
    pub fn is_import(&self) -> bool {
        let kind = self.kind.to_ascii_lowercase();
        IMPORT_KINDS.contains(&kind.as_str())
            || IMPORT_METADATA_KEYS
                .iter()
                .any(|key| self.metadata.contains_key(*key))
    }

    /// Decodes both endpoints given whether each raw id names a component.
    pub fn decode(self, source_is_component: bool, target_is_component: bool) -> Relationship {
        let target = if self.is_import() {
            Endpoint::decode_specifier(&self.target_id, target_is_component)
        } else {
            Endpoint::decode(&self.target_id, target_is_component)
        };
        Relationship {
            source: Endpoint::decode(&self.source_id, source_is_component),
            target,
            id: self.id,
            kind: self.kind,
            location: self.location,
            metadata: self.metadata,
            resolved_source_id: self.resolved_source_id,
            resolved_target_id: self.resolved_target_id,
        }
    }
}

/// A directed, typed edge with decoded endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub kind: String,
    pub source: Endpoint,
    pub target: Endpoint,
    pub location: Option<Location>,
    pub metadata: Map<String, Value>,
    pub resolved_source_id: Option<String>,
    pub resolved_target_id: Option<String>,
}

/// A pending write produced by one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipPatch {
    pub relationship_id: String,
    pub resolved_target_id: Option<String>,
    pub resolved_source_id: Option<String>,
    /// Full merged metadata: the relationship's own keys plus additions.
    pub metadata: Map<String, Value>,
}

/// Shallow-merges `additions` into a copy of `base`. Keys already in `base`
/// are overwritten only by additions carrying the same key.
pub fn merge_metadata(base: &Map<String, Value>, additions: Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in additions {
        merged.insert(key, value);
    }
    merged
}

/// Outcome of resolving one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionStatus {
    Resolved,
    SkippedExternal,
    SkippedStdlib,
    SkippedIgnored,
    SkippedJunk,
    Unresolved,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::SkippedExternal => "skipped_external",
            ResolutionStatus::SkippedStdlib => "skipped_stdlib",
            ResolutionStatus::SkippedIgnored => "skipped_ignored",
            ResolutionStatus::SkippedJunk => "skipped_junk",
            ResolutionStatus::Unresolved => "unresolved",
        }
    }
}

/// Per-status tallies for one side of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub resolved: u64,
    pub skipped_external: u64,
    pub skipped_stdlib: u64,
    pub skipped_ignored: u64,
    pub skipped_junk: u64,
    pub unresolved: u64,
}

impl StatusCounts {
    pub fn from_statuses(statuses: &[ResolutionStatus]) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.record(*status);
        }
        counts
    }

    pub fn record(&mut self, status: ResolutionStatus) {
        let slot = match status {
            ResolutionStatus::Resolved => &mut self.resolved,
            ResolutionStatus::SkippedExternal => &mut self.skipped_external,
            ResolutionStatus::SkippedStdlib => &mut self.skipped_stdlib,
            ResolutionStatus::SkippedIgnored => &mut self.skipped_ignored,
            ResolutionStatus::SkippedJunk => &mut self.skipped_junk,
            ResolutionStatus::Unresolved => &mut self.unresolved,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u64 {
        self.resolved
            + self.skipped_external
            + self.skipped_stdlib
            + self.skipped_ignored
            + self.skipped_junk
            + self.unresolved
    }
}

/// Live counters kept by a pass's resolution context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionMetrics {
    pub file_id_hits: u64,
    pub file_id_misses: u64,
    pub name_id_hits: u64,
    pub name_id_misses: u64,
    pub fs_exists_hits: u64,
    pub fs_exists_misses: u64,
    pub location_hits: u64,
    pub location_misses: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    pub targets_patched: u64,
    pub sources_patched: u64,
}

/// Fraction of lookups served from cache; `0.0` when nothing was looked up.
pub fn hit_ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Result of one complete pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub targets: StatusCounts,
    pub sources: StatusCounts,
    pub metrics: ResolutionMetrics,
    pub duration_ms: u64,
}

impl PassSummary {
    /// Patches confirmed written during the pass.
    pub fn patched(&self) -> u64 {
        self.metrics.targets_patched + self.metrics.sources_patched
    }
}

/// Counts of relationships still waiting for resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedCounts {
    pub relationships: u64,
    pub unresolved_targets: u64,
    pub unresolved_sources: u64,
}
