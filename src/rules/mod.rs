//! Rule engine: pluggable detectors over a StructureMap and raw content
//!
//! Rule ids follow the prefix + number convention (`E501`, `S701`, `C901`);
//! the prefix names the category. A detector is technique-agnostic: it may
//! read structural metadata, walk a syntax tree, or match lines.

pub mod builtin;
pub mod declarative;
pub mod registry;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::extractors::base::StructureMap;
use crate::utils::paths::{extension_lower, to_unix_style};

pub use registry::{attach_findings, DetectionReport, RuleEngine, RuleFilter, SkippedDetector};

/// Issue severity, ordered low to critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => anyhow::bail!("unknown severity '{}'", other),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// Rule category; each has a one-letter (or PERF) id prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Errors,
    Security,
    Complexity,
    Bugs,
    Performance,
    Maintainability,
    Infrastructure,
    Urls,
    Refactoring,
}

const CATEGORIES: &[RuleCategory] = &[
    RuleCategory::Errors,
    RuleCategory::Security,
    RuleCategory::Complexity,
    RuleCategory::Bugs,
    RuleCategory::Performance,
    RuleCategory::Maintainability,
    RuleCategory::Infrastructure,
    RuleCategory::Urls,
    RuleCategory::Refactoring,
];

impl RuleCategory {
    pub fn prefix(&self) -> &'static str {
        match self {
            RuleCategory::Errors => "E",
            RuleCategory::Security => "S",
            RuleCategory::Complexity => "C",
            RuleCategory::Bugs => "B",
            RuleCategory::Performance => "PERF",
            RuleCategory::Maintainability => "M",
            RuleCategory::Infrastructure => "I",
            RuleCategory::Urls => "U",
            RuleCategory::Refactoring => "R",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RuleCategory::Errors => "errors",
            RuleCategory::Security => "security",
            RuleCategory::Complexity => "complexity",
            RuleCategory::Bugs => "bugs",
            RuleCategory::Performance => "performance",
            RuleCategory::Maintainability => "maintainability",
            RuleCategory::Infrastructure => "infrastructure",
            RuleCategory::Urls => "urls",
            RuleCategory::Refactoring => "refactoring",
        }
    }

    /// Accepts a prefix ("S", "PERF") or a name ("security"), any case
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        CATEGORIES
            .iter()
            .copied()
            .find(|c| c.prefix().eq_ignore_ascii_case(s) || c.name().eq_ignore_ascii_case(s))
    }

    /// Category implied by a rule id's prefix ("PERF101" -> Performance)
    pub fn from_rule_id(id: &str) -> Option<Self> {
        let prefix: String = id.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        Self::parse(&prefix)
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where a detector definition came from, in discovery priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOrigin {
    Builtin,
    User,
    Project,
}

/// One reported issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub category: RuleCategory,
    pub rule_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Name of the owning structural element, once attached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
}

impl Finding {
    pub fn at_column(mut self, column: u32) -> Self {
        self.column = column.max(1);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// Detector metadata: id, applicability and defaults for its findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorDescriptor {
    pub id: String,
    pub message: String,
    pub category: RuleCategory,
    pub severity: Severity,
    /// "*", ".ext", an exact file name, or a glob over the file name or path
    pub file_patterns: Vec<String>,
    pub enabled: bool,
    pub origin: RuleOrigin,
}

impl DetectorDescriptor {
    pub fn builtin(
        id: &str,
        message: &str,
        category: RuleCategory,
        severity: Severity,
        file_patterns: &[&str],
    ) -> Self {
        Self {
            id: id.to_string(),
            message: message.to_string(),
            category,
            severity,
            file_patterns: file_patterns.iter().map(|p| p.to_string()).collect(),
            enabled: true,
            origin: RuleOrigin::Builtin,
        }
    }

    /// Whether this detector applies to `path`
    pub fn matches_target(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = extension_lower(path).map(|ext| format!(".{}", ext));

        self.file_patterns.iter().any(|pattern| {
            if pattern == "*" {
                return true;
            }
            if pattern.starts_with('.') && !pattern.contains('*') {
                return extension.as_deref() == Some(pattern.to_ascii_lowercase().as_str());
            }
            if pattern.eq_ignore_ascii_case(&name) {
                return true;
            }
            match glob::Pattern::new(pattern) {
                Ok(glob) if pattern.contains('/') => glob.matches(&to_unix_style(path)),
                Ok(glob) => glob.matches(&name),
                Err(_) => false,
            }
        })
    }

    /// Finding pre-filled with this detector's id, category, severity and message
    pub fn finding(&self, path: &Path, line: u32, message: Option<String>) -> Finding {
        Finding {
            file: path.to_string_lossy().replace('\\', "/"),
            line: line.max(1),
            column: 1,
            severity: self.severity,
            category: self.category,
            rule_id: self.id.clone(),
            message: message.unwrap_or_else(|| self.message.clone()),
            suggestion: None,
            snippet: None,
            element: None,
        }
    }
}

/// A pluggable rule implementation
pub trait Detector: Send + Sync {
    fn descriptor(&self) -> &DetectorDescriptor;

    fn detect(
        &self,
        path: &Path,
        structure: &StructureMap,
        content: &str,
    ) -> anyhow::Result<Vec<Finding>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_and_parsing() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert!("severe".parse::<Severity>().is_err());
    }

    #[test]
    fn test_category_from_prefix_name_and_rule_id() {
        assert_eq!(RuleCategory::parse("S"), Some(RuleCategory::Security));
        assert_eq!(RuleCategory::parse("complexity"), Some(RuleCategory::Complexity));
        assert_eq!(RuleCategory::parse("perf"), Some(RuleCategory::Performance));
        assert_eq!(RuleCategory::parse("X"), None);
        assert_eq!(RuleCategory::from_rule_id("PERF101"), Some(RuleCategory::Performance));
        assert_eq!(RuleCategory::from_rule_id("E501"), Some(RuleCategory::Errors));
    }

    #[test]
    fn test_descriptor_target_matching() {
        let descriptor = DetectorDescriptor::builtin(
            "S701",
            "latest tag",
            RuleCategory::Security,
            Severity::Medium,
            &["Dockerfile", ".dockerfile", "Dockerfile.*", "*/deploy/*.yml"],
        );
        assert!(descriptor.matches_target(Path::new("/app/Dockerfile")));
        assert!(descriptor.matches_target(Path::new("/app/dockerfile")));
        assert!(descriptor.matches_target(Path::new("/app/api.Dockerfile")));
        assert!(descriptor.matches_target(Path::new("/app/Dockerfile.prod")));
        assert!(descriptor.matches_target(Path::new("/srv/deploy/stack.yml")));
        assert!(!descriptor.matches_target(Path::new("/app/main.py")));

        let universal =
            DetectorDescriptor::builtin("E501", "long", RuleCategory::Errors, Severity::Low, &["*"]);
        assert!(universal.matches_target(Path::new("anything")));
    }

    #[test]
    fn test_finding_defaults_from_descriptor() {
        let descriptor =
            DetectorDescriptor::builtin("E501", "Line too long", RuleCategory::Errors, Severity::Low, &["*"]);
        let finding = descriptor
            .finding(Path::new("src/app.py"), 0, None)
            .at_column(89)
            .with_suggestion("wrap it");
        assert_eq!(finding.line, 1);
        assert_eq!(finding.column, 89);
        assert_eq!(finding.rule_id, "E501");
        assert_eq!(finding.message, "Line too long");
        assert_eq!(finding.severity, Severity::Low);
    }
}
