// C902: functions longer than the line limit

use std::path::Path;

use super::callables;
use crate::extractors::base::StructureMap;
use crate::rules::{Detector, DetectorDescriptor, Finding, RuleCategory, Severity};

const MAX_LINES: u32 = 50;

pub struct FunctionLength {
    descriptor: DetectorDescriptor,
}

impl FunctionLength {
    pub fn new() -> Self {
        Self {
            descriptor: DetectorDescriptor::builtin(
                "C902",
                "Function is too long",
                RuleCategory::Complexity,
                Severity::Medium,
                &["*"],
            ),
        }
    }
}

impl Detector for FunctionLength {
    fn descriptor(&self) -> &DetectorDescriptor {
        &self.descriptor
    }

    fn detect(
        &self,
        path: &Path,
        structure: &StructureMap,
        _content: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        Ok(callables(structure)
            .filter(|function| function.line_count() > MAX_LINES)
            .map(|function| {
                let message = format!(
                    "{}: {} ({} lines, max: {})",
                    self.descriptor.message,
                    function.name,
                    function.line_count(),
                    MAX_LINES
                );
                self.descriptor
                    .finding(path, function.start_line, Some(message))
                    .with_suggestion("Extract helper functions")
            })
            .collect())
    }
}
