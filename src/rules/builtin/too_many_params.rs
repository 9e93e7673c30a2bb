// R913: callables with too many parameters, from structural metadata

use std::path::Path;

use super::callables;
use crate::extractors::base::StructureMap;
use crate::rules::{Detector, DetectorDescriptor, Finding, RuleCategory, Severity};

const MAX_PARAMETERS: u32 = 5;

pub struct TooManyParams {
    descriptor: DetectorDescriptor,
}

impl TooManyParams {
    pub fn new() -> Self {
        Self {
            descriptor: DetectorDescriptor::builtin(
                "R913",
                "Too many arguments to function",
                RuleCategory::Refactoring,
                Severity::Medium,
                &["*"],
            ),
        }
    }
}

impl Detector for TooManyParams {
    fn descriptor(&self) -> &DetectorDescriptor {
        &self.descriptor
    }

    fn detect(
        &self,
        path: &Path,
        structure: &StructureMap,
        _content: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for function in callables(structure) {
            let Some(count) = function.metadata.parameter_count else {
                continue;
            };
            if count <= MAX_PARAMETERS {
                continue;
            }
            let message = format!(
                "{} ({} > {}): {}()",
                self.descriptor.message, count, MAX_PARAMETERS, function.name
            );
            let mut finding = self
                .descriptor
                .finding(path, function.start_line, Some(message))
                .with_suggestion(format!(
                    "Reduce to {} or fewer arguments: group them in a config struct or split the function",
                    MAX_PARAMETERS
                ));
            if let Some(signature) = &function.metadata.signature {
                finding = finding.with_snippet(format!("{}{}", function.name, signature));
            }
            findings.push(finding);
        }
        Ok(findings)
    }
}
