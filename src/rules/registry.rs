//! RuleEngine - discover, filter and run detectors with per-detector isolation

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::builtin::builtin_detectors;
use super::declarative::load_root;
use super::{Detector, DetectorDescriptor, Finding, RuleCategory, RuleOrigin};
use crate::config::RevealConfig;
use crate::errors::RevealError;
use crate::extractors::base::{StructuralElement, StructureMap};

/// Select / ignore / category filter over rule ids
///
/// Patterns match by progressive specificity: `"B"` and `"B0"` match
/// `B001`, `"B001"` matches exactly. A pattern that names a category
/// (`"security"`, `"S"`) matches every rule in it. Ignore wins over select.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    pub select: Vec<String>,
    pub ignore: Vec<String>,
    pub categories: Vec<String>,
    /// Outer filter that must also allow a rule
    pub within: Option<Box<RuleFilter>>,
}

impl RuleFilter {
    pub fn categories(categories: &[&str]) -> Self {
        Self {
            categories: categories.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.select.is_empty()
            && self.ignore.is_empty()
            && self.categories.is_empty()
            && self.within.is_none()
    }

    /// Narrow `self` (project-level) by a per-request filter
    ///
    /// Ignore lists add up; select and categories must pass both.
    pub fn combine(&self, request: &RuleFilter) -> RuleFilter {
        if self.is_empty() {
            return request.clone();
        }
        if request.is_empty() {
            return self.clone();
        }
        let mut ignore = request.ignore.clone();
        for pattern in &self.ignore {
            if !ignore.contains(pattern) {
                ignore.push(pattern.clone());
            }
        }
        RuleFilter {
            select: request.select.clone(),
            ignore,
            categories: request.categories.clone(),
            within: Some(Box::new(self.clone())),
        }
    }

    pub fn allows(&self, id: &str, category: RuleCategory) -> bool {
        if let Some(outer) = &self.within {
            if !outer.allows(id, category) {
                return false;
            }
        }
        if self.ignore.iter().any(|p| pattern_matches(p, id, category)) {
            return false;
        }
        if !self.select.is_empty() && !self.select.iter().any(|p| pattern_matches(p, id, category))
        {
            return false;
        }
        if !self.categories.is_empty()
            && !self
                .categories
                .iter()
                .any(|c| RuleCategory::parse(c) == Some(category))
        {
            return false;
        }
        true
    }
}

fn pattern_matches(pattern: &str, id: &str, category: RuleCategory) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }
    id.eq_ignore_ascii_case(pattern)
        || id.to_ascii_uppercase().starts_with(&pattern.to_ascii_uppercase())
        || RuleCategory::parse(pattern) == Some(category)
}

/// A detector that failed and contributed no findings
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDetector {
    pub id: String,
    pub reason: String,
}

/// Findings of one run plus the detectors that were skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionReport {
    pub findings: Vec<Finding>,
    pub skipped: Vec<SkippedDetector>,
    pub detectors_run: usize,
}

impl DetectionReport {
    /// "N detectors skipped due to errors" when anything failed
    pub fn notice(&self) -> Option<String> {
        match self.skipped.len() {
            0 => None,
            1 => Some("1 detector skipped due to errors".to_string()),
            n => Some(format!("{} detectors skipped due to errors", n)),
        }
    }
}

/// Discovered detectors, immutable once built
#[derive(Clone, Default)]
pub struct RuleEngine {
    detectors: Vec<Arc<dyn Detector>>,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self
            .detectors
            .iter()
            .map(|d| d.descriptor().id.as_str())
            .collect();
        f.debug_struct("RuleEngine").field("detectors", &ids).finish()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in detectors only
    pub fn builtin() -> Self {
        let mut engine = Self::new();
        for detector in builtin_detectors() {
            engine.register(detector);
        }
        engine
    }

    /// Built-ins, then each declarative root in priority order
    ///
    /// A later definition with the same id replaces the earlier one.
    pub fn discover(roots: &[(RuleOrigin, PathBuf)]) -> Self {
        let mut engine = Self::builtin();
        for (origin, root) in roots {
            if root.is_dir() {
                let loaded = load_root(root, *origin, &mut engine);
                debug!("Loaded {} rule definitions from {}", loaded, root.display());
            }
        }
        let mut categories: Vec<RuleCategory> = engine
            .detectors
            .iter()
            .map(|d| d.descriptor().category)
            .collect();
        categories.sort_by_key(|c| c.name());
        categories.dedup();
        info!(
            "Discovered {} detectors from {} categories",
            engine.detectors.len(),
            categories.len()
        );
        engine
    }

    pub fn from_config(config: &RevealConfig) -> Self {
        Self::discover(&config.rule_roots())
    }

    /// Add a detector, replacing any detector with the same id
    pub fn register(&mut self, detector: Arc<dyn Detector>) {
        let id = detector.descriptor().id.clone();
        match self
            .detectors
            .iter()
            .position(|d| d.descriptor().id == id)
        {
            Some(index) => {
                debug!(detector_id = %id, "Overriding detector");
                self.detectors[index] = detector;
            }
            None => self.detectors.push(detector),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Detector>> {
        self.detectors.iter().find(|d| d.descriptor().id == id)
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Enabled detectors passing `filter`, sorted by id
    pub fn list(&self, filter: &RuleFilter) -> Vec<DetectorDescriptor> {
        let mut descriptors: Vec<DetectorDescriptor> = self
            .detectors
            .iter()
            .map(|d| d.descriptor())
            .filter(|d| d.enabled && filter.allows(&d.id, d.category))
            .cloned()
            .collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    /// Run every applicable detector; one failing detector never stops the rest
    pub fn run(
        &self,
        path: &Path,
        structure: &StructureMap,
        content: &str,
        filter: &RuleFilter,
    ) -> DetectionReport {
        let mut report = DetectionReport::default();

        for detector in &self.detectors {
            let descriptor = detector.descriptor();
            if !descriptor.enabled
                || !filter.allows(&descriptor.id, descriptor.category)
                || !descriptor.matches_target(path)
            {
                continue;
            }
            report.detectors_run += 1;

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                detector.detect(path, structure, content)
            }));
            let reason = match outcome {
                Ok(Ok(findings)) => {
                    debug!(
                        detector_id = %descriptor.id,
                        "{} findings in {}",
                        findings.len(),
                        path.display()
                    );
                    report.findings.extend(
                        findings
                            .into_iter()
                            .filter(|f| filter.allows(&f.rule_id, f.category)),
                    );
                    continue;
                }
                Ok(Err(e)) => format!("{:#}", e),
                Err(panic) => panic_message(panic.as_ref()),
            };

            let failure = RevealError::DetectorFailure {
                id: descriptor.id.clone(),
                reason: reason.clone(),
            };
            debug!(detector_id = %descriptor.id, path = %path.display(), "{}", failure);
            report.skipped.push(SkippedDetector {
                id: descriptor.id.clone(),
                reason,
            });
        }

        report
            .findings
            .sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.rule_id.cmp(&b.rule_id)));
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

/// Fill `Finding::element` with the innermost element containing the line,
/// else the nearest element starting before it
pub fn attach_findings(findings: &mut [Finding], structure: &StructureMap) {
    let mut elements: Vec<&StructuralElement> = structure.all_elements().map(|(_, e)| e).collect();
    if elements.is_empty() {
        return;
    }
    elements.sort_by_key(|e| e.start_line);

    for finding in findings.iter_mut() {
        let line = finding.line;
        // Elements starting after the line can neither contain nor precede it
        let candidates = &elements[..elements.partition_point(|e| e.start_line <= line)];

        let innermost = candidates
            .iter()
            .filter(|e| e.contains_line(line))
            .min_by_key(|e| (e.line_count(), std::cmp::Reverse(e.start_line)));
        let owner = innermost.or_else(|| {
            candidates
                .iter()
                .max_by_key(|e| (e.last_line(), e.start_line))
        });
        if let Some(owner) = owner {
            finding.element = Some(owner.name.clone());
        }
    }
}
