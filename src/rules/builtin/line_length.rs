// E501: lines longer than the limit

use std::path::Path;

use crate::extractors::base::{truncate_chars, StructureMap};
use crate::rules::{Detector, DetectorDescriptor, Finding, RuleCategory, Severity};

const MAX_LENGTH: usize = 88;
const SNIPPET_CHARS: usize = 80;

/// Lines containing any of these are exempt
const EXEMPT_MARKERS: &[&str] = &["http://", "https://", "ftp://", "# noqa", "# type:"];

pub struct LineLength {
    descriptor: DetectorDescriptor,
}

impl LineLength {
    pub fn new() -> Self {
        Self {
            descriptor: DetectorDescriptor::builtin(
                "E501",
                "Line too long",
                RuleCategory::Errors,
                Severity::Low,
                &["*"],
            ),
        }
    }
}

impl Detector for LineLength {
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
            let length = line.chars().count();
            if length <= MAX_LENGTH || EXEMPT_MARKERS.iter().any(|m| line.contains(m)) {
                continue;
            }
            let message = format!(
                "{} ({} > {} characters, {} over)",
                self.descriptor.message,
                length,
                MAX_LENGTH,
                length - MAX_LENGTH
            );
            findings.push(
                self.descriptor
                    .finding(path, index as u32 + 1, Some(message))
                    .at_column(MAX_LENGTH as u32 + 1)
                    .with_suggestion("Break the line or extract a variable")
                    .with_snippet(truncate_chars(line, SNIPPET_CHARS)),
            );
        }
        Ok(findings)
    }
}
