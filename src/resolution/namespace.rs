//! Namespace-to-path mapping from a composer manifest's autoload rules.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{LinkError, Result};

#[derive(Debug, Default, Deserialize)]
struct ComposerManifest {
    #[serde(default)]
    autoload: Autoload,
    #[serde(default, rename = "autoload-dev")]
    autoload_dev: Autoload,
}

#[derive(Debug, Default, Deserialize)]
struct Autoload {
    #[serde(default, rename = "psr-4")]
    psr4: HashMap<String, PathList>,
    #[serde(default, rename = "psr-0")]
    psr0: HashMap<String, PathList>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PathList {
    One(String),
    Many(Vec<String>),
}

impl PathList {
    fn into_vec(self) -> Vec<String> {
        match self {
            PathList::One(dir) => vec![dir],
            PathList::Many(dirs) => dirs,
        }
    }
}

/// Maps PHP class names to the files composer would load them from.
#[derive(Debug, Clone, Default)]
pub struct ComposerResolver {
    /// Longest prefix first.
    psr4: Vec<(String, Vec<PathBuf>)>,
    psr0: Vec<(String, Vec<PathBuf>)>,
}

impl ComposerResolver {
    /// Parses `composer.json` contents. Directories are taken relative to
    /// `base_dir`.
    pub fn from_manifest(contents: &str, base_dir: &Path) -> Result<Self> {
        let manifest: ComposerManifest =
            serde_json::from_str(contents).map_err(|e| LinkError::Config {
                message: format!("invalid composer manifest: {}", e),
            })?;

        let mut psr4 = Vec::new();
        let mut psr0 = Vec::new();
        for autoload in [manifest.autoload, manifest.autoload_dev] {
            psr4.extend(rules(autoload.psr4, base_dir));
            psr0.extend(rules(autoload.psr0, base_dir));
        }
        psr4.sort_by(|a: &(String, _), b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        psr0.sort_by(|a: &(String, _), b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(Self { psr4, psr0 })
    }

    /// `true` when the manifest declared no PSR-4 or PSR-0 rules.
    pub fn is_empty(&self) -> bool {
        self.psr4.is_empty() && self.psr0.is_empty()
    }

    /// Files that could define `class`, most specific prefix first.
    pub fn candidates(&self, class: &str) -> Vec<PathBuf> {
        let class = class.trim_start_matches('\\');
        let mut out = Vec::new();

        for (prefix, dirs) in &self.psr4 {
            let Some(rest) = class.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let relative = format!("{}.php", rest.replace('\\', "/"));
            out.extend(dirs.iter().map(|dir| dir.join(&relative)));
        }

        for (prefix, dirs) in &self.psr0 {
            if !class.starts_with(prefix.as_str()) {
                continue;
            }
            let relative = psr0_path(class);
            out.extend(dirs.iter().map(|dir| dir.join(&relative)));
        }

        out
    }
}

fn rules(map: HashMap<String, PathList>, base_dir: &Path) -> Vec<(String, Vec<PathBuf>)> {
    map.into_iter()
        .map(|(prefix, dirs)| {
            let dirs = dirs
                .into_vec()
                .into_iter()
                .map(|dir| base_dir.join(dir.trim_end_matches('/')))
                .collect();
            (prefix, dirs)
        })
        .collect()
}

/// PSR-0: namespace separators become directories, and so do underscores in
/// the class name itself.
fn psr0_path(class: &str) -> String {
    let (namespace, name) = match class.rfind('\\') {
        Some(idx) => (&class[..idx], &class[idx + 1..]),
        None => ("", class),
    };
    let mut path = namespace.replace('\\', "/");
    if !path.is_empty() {
        path.push('/');
    }
    path.push_str(&name.replace('_', "/"));
    path.push_str(".php");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "autoload": {
            "psr-4": { "App\\": "src/", "App\\Domain\\": ["domain/", "legacy/domain"] },
            "psr-0": { "Legacy_": "lib/" }
        },
        "autoload-dev": { "psr-4": { "Tests\\": "tests/" } }
    }"#;

    #[test]
    fn longest_psr4_prefix_comes_first() {
        let resolver = ComposerResolver::from_manifest(MANIFEST, Path::new("/p")).unwrap();
        let candidates = resolver.candidates("\\App\\Domain\\Order");
        assert_eq!(candidates[0], PathBuf::from("/p/domain/Order.php"));
        assert_eq!(candidates[1], PathBuf::from("/p/legacy/domain/Order.php"));
        assert_eq!(candidates[2], PathBuf::from("/p/src/Domain/Order.php"));
    }

    #[test]
    fn psr0_underscores_become_directories() {
        let resolver = ComposerResolver::from_manifest(MANIFEST, Path::new("/p")).unwrap();
        assert_eq!(
            resolver.candidates("Legacy_Mail_Sender"),
            vec![PathBuf::from("/p/lib/Legacy/Mail/Sender.php")]
        );
    }

    #[test]
    fn manifest_without_autoload_has_no_candidates() {
        let resolver = ComposerResolver::from_manifest(r#"{ "name": "acme/app" }"#, Path::new("/p")).unwrap();
        assert!(resolver.is_empty());
        assert!(resolver.candidates("App\\User").is_empty());
        let full = ComposerResolver::from_manifest(MANIFEST, Path::new("/p")).unwrap();
        assert!(!full.is_empty());
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        assert!(ComposerResolver::from_manifest("{ nope", Path::new("/p")).is_err());
    }
}
