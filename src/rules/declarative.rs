//! Declarative detector definitions: `<root>/<category>/<ID>.toml`
//!
//! A definition with a `pattern` becomes a line-regex detector. Without a
//! pattern it overrides the metadata (`enabled`, `severity`, `file_patterns`,
//! `message`) of a detector discovered earlier under the same id.
//!
//! ```toml
//! message = "print() left in code"
//! severity = "low"
//! file_patterns = [".py"]
//! pattern = '^\s*print\('
//! suggestion = "Use logging instead"
//! ```

use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::registry::RuleEngine;
use super::{Detector, DetectorDescriptor, Finding, RuleCategory, RuleOrigin, Severity};
use crate::extractors::base::{truncate_chars, StructureMap};

static RULE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]+[0-9]+$").expect("valid rule id regex"));

const SNIPPET_CHARS: usize = 80;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RuleDefinition {
    message: Option<String>,
    severity: Option<String>,
    category: Option<String>,
    file_patterns: Option<Vec<String>>,
    enabled: Option<bool>,
    pattern: Option<String>,
    suggestion: Option<String>,
}

/// Line-by-line regex detector
pub struct PatternDetector {
    descriptor: DetectorDescriptor,
    pattern: Regex,
    suggestion: Option<String>,
}

impl PatternDetector {
    pub fn new(descriptor: DetectorDescriptor, pattern: Regex, suggestion: Option<String>) -> Self {
        Self {
            descriptor,
            pattern,
            suggestion,
        }
    }
}

impl Detector for PatternDetector {
    fn descriptor(&self) -> &DetectorDescriptor {
        &self.descriptor
    }

    fn detect(
        &self,
        path: &Path,
        _structure: &StructureMap,
        content: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let Some(found) = self.pattern.find(line) else {
                continue;
            };
            let column = line[..found.start()].chars().count() as u32 + 1;
            let mut finding = self
                .descriptor
                .finding(path, index as u32 + 1, None)
                .at_column(column)
                .with_snippet(truncate_chars(line.trim(), SNIPPET_CHARS));
            if let Some(suggestion) = &self.suggestion {
                finding = finding.with_suggestion(suggestion.clone());
            }
            findings.push(finding);
        }
        Ok(findings)
    }
}

/// An existing detector running under replaced metadata
pub struct OverriddenDetector {
    inner: Arc<dyn Detector>,
    descriptor: DetectorDescriptor,
}

impl OverriddenDetector {
    pub fn new(inner: Arc<dyn Detector>, descriptor: DetectorDescriptor) -> Self {
        Self { inner, descriptor }
    }
}

impl Detector for OverriddenDetector {
    fn descriptor(&self) -> &DetectorDescriptor {
        &self.descriptor
    }

    fn detect(
        &self,
        path: &Path,
        structure: &StructureMap,
        content: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let inner_message = &self.inner.descriptor().message;
        let mut findings = self.inner.detect(path, structure, content)?;
        for finding in &mut findings {
            finding.severity = self.descriptor.severity;
            // Only default messages are replaced; computed ones carry details
            if &finding.message == inner_message {
                finding.message = self.descriptor.message.clone();
            }
        }
        Ok(findings)
    }
}

/// Definition files under `root`, sorted; `_`-prefixed directories are skipped
fn definition_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if path.is_dir() {
                if !name.starts_with('_') && !name.starts_with('.') {
                    dirs.push(path);
                }
            } else if path.extension().is_some_and(|ext| ext == "toml") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Load every definition under `root` into `engine`; returns how many were registered
pub fn load_root(root: &Path, origin: RuleOrigin, engine: &mut RuleEngine) -> usize {
    let files = match definition_files(root) {
        Ok(files) => files,
        Err(e) => {
            warn!("Skipping rule root {}: {:#}", root.display(), e);
            return 0;
        }
    };

    let mut loaded = 0;
    for file in files {
        match load_definition(&file, origin, engine) {
            Ok(detector) => {
                debug!(detector_id = %detector.descriptor().id, path = %file.display(), "Loaded rule definition");
                engine.register(detector);
                loaded += 1;
            }
            Err(e) => warn!("Skipping rule definition {}: {:#}", file.display(), e),
        }
    }
    loaded
}

fn load_definition(
    file: &Path,
    origin: RuleOrigin,
    engine: &RuleEngine,
) -> anyhow::Result<Arc<dyn Detector>> {
    let id = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    if !RULE_ID.is_match(&id) {
        bail!("'{}' is not a rule id (expected e.g. E501)", id);
    }

    let text =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let definition: RuleDefinition =
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", file.display()))?;

    let severity = definition
        .severity
        .as_deref()
        .map(str::parse::<Severity>)
        .transpose()?;

    match &definition.pattern {
        Some(pattern) => {
            let regex = Regex::new(pattern).with_context(|| format!("Invalid pattern for {}", id))?;
            let category = match definition.category.as_deref() {
                Some(name) => RuleCategory::parse(name)
                    .with_context(|| format!("Unknown category '{}'", name))?,
                None => category_for(file, &id)?,
            };
            let descriptor = DetectorDescriptor {
                message: definition.message.clone().unwrap_or_else(|| id.clone()),
                category,
                severity: severity.unwrap_or(Severity::Medium),
                file_patterns: definition
                    .file_patterns
                    .clone()
                    .unwrap_or_else(|| vec!["*".to_string()]),
                enabled: definition.enabled.unwrap_or(true),
                origin,
                id,
            };
            Ok(Arc::new(PatternDetector::new(
                descriptor,
                regex,
                definition.suggestion,
            )))
        }
        None => {
            let Some(inner) = engine.get(&id) else {
                bail!("no detector '{}' to override and no pattern given", id);
            };
            let mut descriptor = inner.descriptor().clone();
            descriptor.origin = origin;
            if let Some(severity) = severity {
                descriptor.severity = severity;
            }
            if let Some(enabled) = definition.enabled {
                descriptor.enabled = enabled;
            }
            if let Some(patterns) = definition.file_patterns {
                descriptor.file_patterns = patterns;
            }
            if let Some(message) = definition.message {
                descriptor.message = message;
            }
            Ok(Arc::new(OverriddenDetector::new(Arc::clone(inner), descriptor)))
        }
    }
}

/// Category from the parent directory name, else from the id prefix
fn category_for(file: &Path, id: &str) -> anyhow::Result<RuleCategory> {
    file.parent()
        .and_then(|dir| dir.file_name())
        .and_then(|name| RuleCategory::parse(&name.to_string_lossy()))
        .or_else(|| RuleCategory::from_rule_id(id))
        .with_context(|| format!("Cannot infer a category for {}", id))
}
