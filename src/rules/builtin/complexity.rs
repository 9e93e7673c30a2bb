// C901: cyclomatic complexity estimated from decision keywords

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::{callables, element_lines};
use crate::extractors::base::StructureMap;
use crate::rules::{Detector, DetectorDescriptor, Finding, RuleCategory, Severity};

const MAX_COMPLEXITY: usize = 10;

static DECISION_POINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:if|elif|for|while|and|or|except|case|when|catch)\b|&&|\|\|")
        .expect("valid decision point regex")
});

pub struct Complexity {
    descriptor: DetectorDescriptor,
}

impl Complexity {
    pub fn new() -> Self {
        Self {
            descriptor: DetectorDescriptor::builtin(
                "C901",
                "Function is too complex",
                RuleCategory::Complexity,
                Severity::Medium,
                &["*"],
            ),
        }
    }
}

/// 1 + decision points within the lines
pub fn complexity<'a>(lines: impl Iterator<Item = &'a str>) -> usize {
    1 + lines
        .map(|line| DECISION_POINT.find_iter(line).count())
        .sum::<usize>()
}

impl Detector for Complexity {
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
            let score = complexity(element_lines(content, function).map(|(_, line)| line));
            if score > MAX_COMPLEXITY {
                let message = format!(
                    "{}: {} (complexity: {}, max: {})",
                    self.descriptor.message, function.name, score, MAX_COMPLEXITY
                );
                findings.push(
                    self.descriptor
                        .finding(path, function.start_line, Some(message))
                        .with_suggestion("Break into smaller functions or reduce branching"),
                );
            }
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::base::{ElementKind, StructuralElement};

    #[test]
    fn test_keywords_count_on_word_boundaries() {
        let lines = ["if a and b or c:", "    notify(order, formation)", "while x && y || z"];
        // if, and, or, while, &&, ||
        assert_eq!(complexity(lines.iter().copied()), 7);
    }

    #[test]
    fn test_flags_branchy_functions_only() {
        let mut content = String::from("def simple():\n    return 1\n\ndef branchy(x):\n");
        for i in 0..11 {
            content.push_str(&format!("    if x == {}:\n        return {}\n", i, i));
        }
        let mut structure = StructureMap::new();
        structure.push(
            "functions",
            StructuralElement::new(ElementKind::Function, "simple", 1).with_end_line(2),
        );
        structure.push(
            "functions",
            StructuralElement::new(ElementKind::Function, "branchy", 4).with_end_line(26),
        );

        let findings = Complexity::new()
            .detect(Path::new("m.py"), &structure, &content)
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 4);
        assert!(findings[0].message.contains("branchy (complexity: 12, max: 10)"));
    }
}
