//! Configuration discovery and per-invocation requests.
//!
//! Reveal reads `reveal.toml` from the analyzed path's directory (or the
//! closest ancestor). Every field is optional:
//! - `max_file_bytes`: 2 MiB, `force`: false
//! - `jobs`: 0 (one worker per core), `timeout_ms`: 30000 (0 disables)
//! - `allow_fallback`: true
//! - `[rules]`: select / ignore / categories plus the user and project rule roots
//! - `[[analyzers]]`: user extension modules for the analyzer registry

use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::errors::{Result, RevealError};
use crate::rules::{RuleFilter, RuleOrigin};
use crate::slicer::SliceRequest;
use crate::source::{ReadLimits, DEFAULT_MAX_FILE_BYTES};

pub const CONFIG_FILE_NAME: &str = "reveal.toml";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Root configuration loaded from `reveal.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub max_file_bytes: u64,
    pub force: bool,
    pub jobs: usize,
    pub timeout_ms: u64,
    pub allow_fallback: bool,
    pub rules: RulesConfig,
    pub analyzers: Vec<AnalyzerModule>,
    /// Directory the config was loaded from
    #[serde(skip)]
    pub root: Option<PathBuf>,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            force: false,
            jobs: 0,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            allow_fallback: true,
            rules: RulesConfig::default(),
            analyzers: Vec::new(),
            root: None,
        }
    }
}

/// `[rules]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub select: Vec<String>,
    pub ignore: Vec<String>,
    pub categories: Vec<String>,
    /// User-global rule root (defaults to `~/.reveal/rules`)
    pub user_dir: Option<PathBuf>,
    /// Project-local rule root (defaults to `.reveal/rules` beside the config)
    pub project_dir: Option<PathBuf>,
    pub enable_user_rules: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            select: Vec::new(),
            ignore: Vec::new(),
            categories: Vec::new(),
            user_dir: None,
            project_dir: None,
            enable_user_rules: true,
        }
    }
}

impl RulesConfig {
    pub fn filter(&self) -> RuleFilter {
        RuleFilter {
            select: self.select.clone(),
            ignore: self.ignore.clone(),
            categories: self.categories.clone(),
            within: None,
        }
    }
}

/// One `[[analyzers]]` entry
///
/// Either aliases a built-in extractor (`extractor = "yaml"`) or defines a
/// syntax-tree extractor over a bundled grammar (`grammar = "python"` plus
/// `[analyzers.categories]`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzerModule {
    pub name: String,
    pub display_name: Option<String>,
    pub patterns: Vec<String>,
    pub extractor: Option<String>,
    pub grammar: Option<String>,
    pub categories: BTreeMap<String, Vec<String>>,
}

impl RevealConfig {
    /// Parse one config file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: RevealConfig = toml::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.root = path.parent().map(Path::to_path_buf);
        debug!(
            "Loaded config {} ({} analyzer modules)",
            path.display(),
            config.analyzers.len()
        );
        Ok(config)
    }

    /// Walk upward from `start` to the closest `reveal.toml`; defaults when none exists
    pub fn discover(start: &Path) -> Result<Self> {
        let start = if start.is_file() {
            start.parent().unwrap_or(start)
        } else {
            start
        };
        for dir in start.ancestors() {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Self::load(&candidate).map_err(|e| RevealError::config(format!("{:#}", e)));
            }
        }
        Ok(Self::default())
    }

    pub fn read_limits(&self) -> ReadLimits {
        ReadLimits {
            max_bytes: self.max_file_bytes,
            force: self.force,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Worker count for batch runs; 0 means one per core
    pub fn worker_count(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Declarative rule roots in priority order (user-global, then project-local)
    pub fn rule_roots(&self) -> Vec<(RuleOrigin, PathBuf)> {
        let mut roots = Vec::new();
        if self.rules.enable_user_rules {
            let user = self.rules.user_dir.clone().or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".reveal/rules"))
            });
            roots.extend(user.map(|dir| (RuleOrigin::User, dir)));
        }
        let project = match (&self.rules.project_dir, &self.root) {
            (Some(dir), Some(root)) if dir.is_relative() => root.join(dir),
            (Some(dir), _) => dir.clone(),
            (None, Some(root)) => root.join(".reveal/rules"),
            (None, None) => PathBuf::from(".reveal/rules"),
        };
        roots.push((RuleOrigin::Project, project));
        roots
    }
}

/// Which element to extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementQuery {
    /// Empty searches every category
    pub category: String,
    pub name: String,
}

/// The resolved options for one analysis, as handed in by the CLI layer
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub element: Option<ElementQuery>,
    pub slice: SliceRequest,
    pub outline: bool,
    pub detect: bool,
    pub filter: RuleFilter,
}

impl AnalysisRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, category: &str, name: &str) -> Self {
        self.element = Some(ElementQuery {
            category: category.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_slice(mut self, slice: SliceRequest) -> Self {
        self.slice = slice;
        self
    }

    pub fn with_outline(mut self) -> Self {
        self.outline = true;
        self
    }

    pub fn with_detection(mut self, filter: RuleFilter) -> Self {
        self.detect = true;
        self.filter = filter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_config_file() {
        let temp = TempDir::new().unwrap();
        let config = RevealConfig::discover(temp.path()).unwrap();
        assert_eq!(config.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
        assert_eq!(config.timeout(), Some(Duration::from_millis(30_000)));
        assert!(config.allow_fallback);
        assert!(config.rules.enable_user_rules);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_discover_walks_up_to_ancestor_config() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            r#"
jobs = 2
timeout_ms = 0

[rules]
select = ["C", "E501"]
ignore = ["C902"]
enable_user_rules = false

[[analyzers]]
name = "workflows"
patterns = ["/.github/workflows/"]
extractor = "yaml"

[[analyzers]]
name = "starlark"
patterns = [".star"]
grammar = "python"
[analyzers.categories]
functions = ["function_definition"]
"#,
        )
        .unwrap();
        let nested = temp.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();

        let config = RevealConfig::discover(&nested).unwrap();
        assert_eq!(config.worker_count(), 2);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.rules.filter().select, vec!["C", "E501"]);
        assert_eq!(config.analyzers.len(), 2);
        assert_eq!(config.analyzers[1].categories["functions"].len(), 1);

        let roots = config.rule_roots();
        assert_eq!(
            roots,
            vec![(RuleOrigin::Project, temp.path().join(".reveal/rules"))]
        );
    }

    #[test]
    fn test_invalid_config_is_a_config_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "jobs = \"many\"\n").unwrap();
        let err = RevealConfig::discover(temp.path()).unwrap_err();
        assert!(matches!(err, RevealError::Config(_)));
        assert!(err.is_fatal());
    }
}
