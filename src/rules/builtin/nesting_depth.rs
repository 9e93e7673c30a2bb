// C905: nesting depth measured from indentation inside a function body

use std::path::Path;

use super::{callables, element_lines};
use crate::extractors::base::StructureMap;
use crate::rules::{Detector, DetectorDescriptor, Finding, RuleCategory, Severity};

const MAX_DEPTH: usize = 4;
const TAB_WIDTH: usize = 4;

pub struct NestingDepth {
    descriptor: DetectorDescriptor,
}

impl NestingDepth {
    pub fn new() -> Self {
        Self {
            descriptor: DetectorDescriptor::builtin(
                "C905",
                "Nesting too deep",
                RuleCategory::Complexity,
                Severity::Medium,
                &["*"],
            ),
        }
    }
}

fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += TAB_WIDTH,
            _ => break,
        }
    }
    width
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with("//") || trimmed.starts_with("--")
}

/// Deepest block nesting below the body level, with the line it occurs on
///
/// The first body line fixes the indentation unit; lines at or left of the
/// header (closing braces, dedented continuations) are ignored.
pub fn max_nesting<'a>(
    header: &str,
    body: impl Iterator<Item = (u32, &'a str)>,
) -> Option<(usize, u32)> {
    let header_indent = indent_width(header);
    let mut unit: Option<usize> = None;
    let mut deepest: Option<(usize, u32)> = None;

    for (line_number, line) in body {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_comment(trimmed) {
            continue;
        }
        let indent = indent_width(line);
        if indent <= header_indent {
            continue;
        }
        let unit = *unit.get_or_insert(indent - header_indent);
        let depth = (indent - header_indent) / unit;
        let nesting = depth.saturating_sub(1);
        if deepest.map_or(true, |(max, _)| nesting > max) {
            deepest = Some((nesting, line_number));
        }
    }
    deepest
}

impl Detector for NestingDepth {
    fn descriptor(&self) -> &DetectorDescriptor {
        &self.descriptor
    }

    fn detect(
        &self,
        path: &Path,
        structure: &StructureMap,
        content: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for function in callables(structure) {
            let mut lines = element_lines(content, function);
            let Some((_, header)) = lines.next() else {
                continue;
            };
            let Some((depth, line)) = max_nesting(header, lines) else {
                continue;
            };
            if depth > MAX_DEPTH {
                let message = format!(
                    "{}: {} (depth: {}, max: {})",
                    self.descriptor.message, function.name, depth, MAX_DEPTH
                );
                findings.push(
                    self.descriptor
                        .finding(path, line, Some(message))
                        .with_suggestion("Use early returns or extract the inner blocks"),
                );
            }
        }
        Ok(findings)
    }
}
