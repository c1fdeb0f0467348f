use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use crate::errors::{LinkError, Result};

/// Name of the configuration file stored inside the `.graphlink` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory used to store graphlink metadata.
pub const GRAPHLINK_DIR: &str = ".graphlink";

/// Environment variable overriding `debounce_ms`.
pub const ENV_DEBOUNCE_MS: &str = "GRAPHLINK_DEBOUNCE_MS";

/// Environment variable overriding `batch_size`.
pub const ENV_BATCH_SIZE: &str = "GRAPHLINK_BATCH_SIZE";

/// Configuration for relationship resolution in one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Root directory of the indexed project.
    pub root_dir: String,
    /// Quiet period after the last `schedule()` before a pass starts.
    pub debounce_ms: u64,
    /// Relationships resolved between two flushes.
    pub batch_size: usize,
    /// Glob patterns for targets that are never worth resolving
    /// (generated code, build output).
    pub ignore: Vec<String>,
    /// Path of the composer manifest, relative to `root_dir`.
    pub composer_file: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            version: 1,
            root_dir: String::new(),
            debounce_ms: 750,
            batch_size: 800,
            ignore: vec![
                "**/node_modules/**".to_string(),
                "**/dist/**".to_string(),
                "**/build/**".to_string(),
                "**/target/**".to_string(),
                "**/__generated__/**".to_string(),
                "**/*.generated.*".to_string(),
                "**/*.min.js".to_string(),
            ],
            composer_file: "composer.json".to_string(),
        }
    }
}

impl LinkConfig {
    /// Debounce interval as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Batch size, never less than one.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Applies `GRAPHLINK_DEBOUNCE_MS` / `GRAPHLINK_BATCH_SIZE` from the
    /// process environment. Unparseable values are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_DEBOUNCE_MS).ok().as_deref(),
            std::env::var(ENV_BATCH_SIZE).ok().as_deref(),
        )
    }

    fn with_overrides(mut self, debounce_ms: Option<&str>, batch_size: Option<&str>) -> Self {
        if let Some(ms) = debounce_ms.and_then(|v| v.trim().parse::<u64>().ok()) {
            self.debounce_ms = ms;
        }
        if let Some(size) = batch_size.and_then(|v| v.trim().parse::<usize>().ok()) {
            self.batch_size = size;
        }
        self
    }
}

/// Returns the path to the `.graphlink` directory within the given project root.
pub fn get_graphlink_dir(project_root: &Path) -> PathBuf {
    project_root.join(GRAPHLINK_DIR)
}

/// Returns the path to the configuration file within the `.graphlink` directory.
pub fn get_config_path(project_root: &Path) -> PathBuf {
    get_graphlink_dir(project_root).join(CONFIG_FILENAME)
}

/// Loads the configuration from disk.
///
/// If the configuration file does not exist, returns a default configuration
/// with `root_dir` set to the given project root.
pub fn load_config(project_root: &Path) -> Result<LinkConfig> {
    let config_path = get_config_path(project_root);

    if !config_path.exists() {
        return Ok(LinkConfig {
            root_dir: project_root.to_string_lossy().to_string(),
            ..LinkConfig::default()
        });
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| LinkError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    let mut config: LinkConfig =
        serde_json::from_str(&contents).map_err(|e| LinkError::Config {
            message: format!(
                "failed to parse config file '{}': {}",
                config_path.display(),
                e
            ),
        })?;

    if config.root_dir.is_empty() {
        config.root_dir = project_root.to_string_lossy().to_string();
    }

    Ok(config)
}

/// Saves the configuration to disk using an atomic write.
///
/// Writes to a temporary file first and then renames it to the final location.
pub fn save_config(project_root: &Path, config: &LinkConfig) -> Result<()> {
    let graphlink_dir = get_graphlink_dir(project_root);
    fs::create_dir_all(&graphlink_dir).map_err(|e| LinkError::Config {
        message: format!(
            "failed to create graphlink directory '{}': {}",
            graphlink_dir.display(),
            e
        ),
    })?;

    let config_path = get_config_path(project_root);
    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config).map_err(|e| LinkError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;

    fs::write(&tmp_path, &json).map_err(|e| LinkError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, &config_path).map_err(|e| LinkError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
    })?;

    Ok(())
}

/// Compiled ignore patterns. Invalid globs are dropped.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    patterns: Vec<Pattern>,
}

impl IgnoreMatcher {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect(),
        }
    }

    /// Returns `true` if the path or specifier matches any ignore pattern.
    pub fn is_ignored(&self, target: &str) -> bool {
        let match_opts = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        let normalized = target.replace('\\', "/");
        self.patterns
            .iter()
            .any(|p| p.matches_with(&normalized, match_opts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_only_when_parseable() {
        let config = LinkConfig::default().with_overrides(Some("20"), Some("oops"));
        assert_eq!(config.debounce_ms, 20);
        assert_eq!(config.batch_size, 800);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let config = LinkConfig {
            batch_size: 0,
            ..LinkConfig::default()
        };
        assert_eq!(config.effective_batch_size(), 1);
    }
}
