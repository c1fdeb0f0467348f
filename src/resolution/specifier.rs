//! Pure rules for reading import specifiers: how a specifier is classified,
//! which project paths it may name, and which package it belongs to.

use std::path::{Component as PathPart, Path, PathBuf};

use crate::types::Language;

/// Syntactic class of a specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `./x`, `../x`, `/abs/x`, Python `.mod`, Rust `crate::`/`self::`/`super::`.
    Relative,
    /// Project-root alias such as `@/components/x` or `~/lib/x`.
    Alias,
    /// A namespace path (PHP `App\Models\User`).
    Namespace,
    /// A registry package, possibly with a sub-path (`lodash/fp`, `@scope/pkg`).
    Bare,
    /// Anything else: URLs, odd characters.
    Other,
}

/// Classifies `spec` under the conventions of `language`.
pub fn classify(spec: &str, language: Language) -> SpecifierKind {
    if spec.is_empty() {
        return SpecifierKind::Other;
    }
    if spec.starts_with("./") || spec.starts_with("../") || spec == "." || spec == ".." {
        return SpecifierKind::Relative;
    }
    if spec.starts_with('/') {
        return SpecifierKind::Relative;
    }
    match language {
        Language::Python if spec.starts_with('.') => return SpecifierKind::Relative,
        Language::Rust
            if spec.starts_with("crate::")
                || spec.starts_with("self::")
                || spec.starts_with("super::") =>
        {
            return SpecifierKind::Relative
        }
        Language::TypeScript | Language::JavaScript
            if spec.starts_with("@/") || spec.starts_with("~/") =>
        {
            return SpecifierKind::Alias
        }
        _ => {}
    }
    if spec.contains("://") || spec.chars().any(char::is_whitespace) {
        return SpecifierKind::Other;
    }
    if language == Language::Php {
        return if is_php_name(spec) {
            SpecifierKind::Namespace
        } else {
            SpecifierKind::Other
        };
    }
    if spec.contains('\\') {
        return SpecifierKind::Namespace;
    }
    let package_like = spec
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '/' | '-' | '_' | '.' | ':' | '$'));
    if package_like && !spec.starts_with('.') {
        SpecifierKind::Bare
    } else {
        SpecifierKind::Other
    }
}

fn is_php_name(spec: &str) -> bool {
    let trimmed = spec.trim_start_matches('\\');
    !trimmed.is_empty()
        && trimmed
            .split('\\')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

/// Normalizes a bare specifier to the package it belongs to.
///
/// `@scope/pkg/sub` -> `@scope/pkg`, `lodash/fp` -> `lodash`,
/// `requests.adapters` -> `requests`, `github.com/a/b/c` -> `github.com/a/b`,
/// `serde::Deserialize` -> `serde`.
pub fn package_root(spec: &str, language: Language) -> String {
    let spec = spec.trim_start_matches("npm:");
    match language {
        Language::TypeScript | Language::JavaScript => {
            let mut segments = spec.split('/');
            let first = segments.next().unwrap_or_default();
            if first.starts_with('@') {
                match segments.next() {
                    Some(second) if !second.is_empty() => format!("{first}/{second}"),
                    _ => first.to_string(),
                }
            } else {
                first.to_string()
            }
        }
        Language::Python => first_segment(spec, '.'),
        Language::Go => {
            let segments: Vec<&str> = spec.split('/').collect();
            if segments.first().is_some_and(|host| host.contains('.')) {
                segments[..segments.len().min(3)].join("/")
            } else {
                segments.first().copied().unwrap_or_default().to_string()
            }
        }
        Language::Java | Language::Kotlin | Language::CSharp => {
            let segments: Vec<&str> = spec.split('.').collect();
            segments[..segments.len().min(2)].join(".")
        }
        Language::Rust => spec.split("::").next().unwrap_or_default().to_string(),
        Language::Php => spec.trim_start_matches('\\').to_string(),
        Language::Ruby | Language::Unknown => first_segment(spec, '/'),
    }
}

fn first_segment(spec: &str, separator: char) -> String {
    spec.split(separator).next().unwrap_or_default().to_string()
}

/// Lexically normalizes `.` and `..` components without touching the disk.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for part in path.components() {
        match part {
            PathPart::CurDir => {}
            PathPart::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// File candidates for `base`, in the order a module loader would try them.
///
/// `base` itself when it already has an extension, the same stem with each
/// language extension (so `./foo.js` finds `foo.ts`), `base.<ext>`, then the
/// index files inside `base`.
pub fn expand_file_candidates(base: &Path, language: Language) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let extensions = language.extensions();

    if base.extension().is_some() {
        candidates.push(base.to_path_buf());
        for ext in extensions {
            candidates.push(base.with_extension(ext));
        }
    }
    for ext in extensions {
        candidates.push(append_extension(base, ext));
    }
    for index in language.index_files() {
        for ext in extensions {
            candidates.push(base.join(format!("{index}.{ext}")));
        }
    }

    dedupe(candidates)
}

fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut raw = base.as_os_str().to_owned();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

fn dedupe(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    paths.into_iter().filter(|p| seen.insert(p.clone())).collect()
}

fn parent_dir(file: &Path) -> PathBuf {
    file.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Candidate files for a relative specifier written in `source_file`.
pub fn relative_candidates(spec: &str, source_file: &Path, language: Language) -> Vec<PathBuf> {
    match language {
        Language::Python if spec.starts_with('.') && !spec.starts_with("./") && !spec.starts_with("../") => {
            python_relative_candidates(spec, source_file)
        }
        Language::Rust if !spec.starts_with('.') && !spec.starts_with('/') => {
            rust_module_candidates(spec, source_file)
        }
        _ => {
            let base = if spec.starts_with('/') {
                PathBuf::from(spec)
            } else {
                parent_dir(source_file).join(spec)
            };
            expand_file_candidates(&normalize_path(&base), language)
        }
    }
}

/// `.utils` / `..pkg.mod`: one dot is the current package, each extra dot
/// climbs one directory.
fn python_relative_candidates(spec: &str, source_file: &Path) -> Vec<PathBuf> {
    let dots = spec.chars().take_while(|c| *c == '.').count();
    let rest = &spec[dots..];
    let mut dir = parent_dir(source_file);
    for _ in 1..dots {
        dir = parent_dir(&dir);
    }
    if rest.is_empty() {
        return vec![dir.join("__init__.py")];
    }
    let base = rest.split('.').fold(dir, |acc, seg| acc.join(seg));
    expand_file_candidates(&base, Language::Python)
}

/// `crate::a::b::Item`, `self::x`, `super::super::y`. The trailing segments
/// may name items rather than modules, so progressively shorter module
/// paths are tried.
fn rust_module_candidates(spec: &str, source_file: &Path) -> Vec<PathBuf> {
    let mut segments: Vec<&str> = spec.split("::").filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Vec::new();
    }

    let mut anchor = match segments[0] {
        "crate" => crate_src_root(source_file),
        _ => rust_module_dir(source_file),
    };
    let mut consumed = 1;
    if segments[0] == "super" {
        anchor = parent_dir(&anchor);
        while segments.get(consumed) == Some(&"super") {
            anchor = parent_dir(&anchor);
            consumed += 1;
        }
    }
    segments.drain(..consumed);

    let mut candidates = Vec::new();
    for len in (1..=segments.len()).rev() {
        let base = segments[..len].iter().fold(anchor.clone(), |acc, seg| acc.join(seg));
        candidates.push(append_extension(&base, "rs"));
        candidates.push(base.join("mod.rs"));
    }
    candidates
}

fn crate_src_root(source_file: &Path) -> PathBuf {
    source_file
        .ancestors()
        .skip(1)
        .find(|dir| dir.file_name().is_some_and(|name| name == "src"))
        .map(Path::to_path_buf)
        .unwrap_or_else(|| parent_dir(source_file))
}

fn rust_module_dir(source_file: &Path) -> PathBuf {
    let dir = parent_dir(source_file);
    match source_file.file_stem().and_then(|s| s.to_str()) {
        Some("mod" | "lib" | "main") | None => dir,
        Some(stem) => dir.join(stem),
    }
}

/// Candidates for `@/x` and `~/x`: the project root and its `src/`.
pub fn alias_candidates(spec: &str, project_root: &Path, language: Language) -> Vec<PathBuf> {
    let rest = &spec[2..];
    let mut candidates = expand_file_candidates(&project_root.join("src").join(rest), language);
    candidates.extend(expand_file_candidates(&project_root.join(rest), language));
    dedupe(candidates)
}

/// Project files a bare specifier may name before it is judged external:
/// Python dotted modules from the source directory and the project root,
/// Ruby `require` paths under `lib/`.
pub fn project_module_candidates(
    spec: &str,
    source_file: Option<&Path>,
    project_root: &Path,
    language: Language,
) -> Vec<PathBuf> {
    match language {
        Language::Python => {
            let rel: PathBuf = spec.split('.').collect();
            let mut candidates = Vec::new();
            if let Some(file) = source_file {
                candidates.extend(expand_file_candidates(&parent_dir(file).join(&rel), language));
            }
            candidates.extend(expand_file_candidates(&project_root.join(&rel), language));
            candidates.extend(expand_file_candidates(&project_root.join("src").join(&rel), language));
            dedupe(candidates)
        }
        Language::Ruby => {
            let mut candidates = expand_file_candidates(&project_root.join("lib").join(spec), language);
            candidates.extend(expand_file_candidates(&project_root.join(spec), language));
            dedupe(candidates)
        }
        _ => Vec::new(),
    }
}

/// The trailing file name of a loose path fragment with its extension
/// stripped: `vendor/lib/graph.py` -> `graph`.
pub fn fragment_stem(fragment: &str) -> &str {
    let name = fragment
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    match name.find('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_shapes() {
        assert_eq!(classify("./foo", Language::TypeScript), SpecifierKind::Relative);
        assert_eq!(classify("lodash/fp", Language::TypeScript), SpecifierKind::Bare);
        assert_eq!(classify("@/components/Button", Language::TypeScript), SpecifierKind::Alias);
        assert_eq!(classify("..models", Language::Python), SpecifierKind::Relative);
        assert_eq!(classify("super::util", Language::Rust), SpecifierKind::Relative);
        assert_eq!(classify("App\\Models\\User", Language::Php), SpecifierKind::Namespace);
        assert_eq!(classify("https://cdn.example.com/x.js", Language::JavaScript), SpecifierKind::Other);
    }

    #[test]
    fn package_roots() {
        assert_eq!(package_root("@babel/core/lib/parse", Language::TypeScript), "@babel/core");
        assert_eq!(package_root("lodash/fp", Language::JavaScript), "lodash");
        assert_eq!(package_root("requests.adapters", Language::Python), "requests");
        assert_eq!(package_root("github.com/spf13/cobra/doc", Language::Go), "github.com/spf13/cobra");
        assert_eq!(package_root("serde::de::Visitor", Language::Rust), "serde");
    }

    #[test]
    fn js_extension_swap_is_tried() {
        let candidates = relative_candidates("./foo.js", Path::new("/proj/src/index.ts"), Language::TypeScript);
        assert_eq!(candidates[0], PathBuf::from("/proj/src/foo.js"));
        assert!(candidates.contains(&PathBuf::from("/proj/src/foo.ts")));
        assert!(candidates.contains(&PathBuf::from("/proj/src/foo.js/index.ts")));
    }

    #[test]
    fn python_relative_climbs_packages() {
        let candidates = relative_candidates("..core.graph", Path::new("/p/app/api/views.py"), Language::Python);
        assert_eq!(candidates[0], PathBuf::from("/p/app/core/graph.py"));
        assert!(candidates.contains(&PathBuf::from("/p/app/core/graph/__init__.py")));
    }

    #[test]
    fn rust_crate_paths_start_at_src() {
        let candidates = relative_candidates("crate::db::Database", Path::new("/p/src/cli/run.rs"), Language::Rust);
        assert_eq!(candidates[0], PathBuf::from("/p/src/db/Database.rs"));
        assert!(candidates.contains(&PathBuf::from("/p/src/db.rs")));
        assert!(candidates.contains(&PathBuf::from("/p/src/db/mod.rs")));
    }

    #[test]
    fn normalize_resolves_parent_segments() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    }

    #[test]
    fn fragment_stems() {
        assert_eq!(fragment_stem("vendor/lib/graph.py"), "graph");
        assert_eq!(fragment_stem("com\\example\\UserService"), "UserService");
        assert_eq!(fragment_stem("pkg/"), "pkg");
    }
}
