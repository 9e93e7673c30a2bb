// B001: bare `except:` in Python

use std::path::Path;

use crate::extractors::base::tree_methods::{named_children, node_text, parse_source, walk_preorder};
use crate::extractors::base::StructureMap;
use crate::rules::{Detector, DetectorDescriptor, Finding, RuleCategory, Severity};
use crate::source::Source;

pub struct BareExcept {
    descriptor: DetectorDescriptor,
}

impl BareExcept {
    pub fn new() -> Self {
        Self {
            descriptor: DetectorDescriptor::builtin(
                "B001",
                "Bare except clause catches all exceptions including SystemExit",
                RuleCategory::Bugs,
                Severity::High,
                &[".py", ".pyi"],
            ),
        }
    }
}

impl Detector for BareExcept {
    fn descriptor(&self) -> &DetectorDescriptor {
        &self.descriptor
    }

    fn detect(
        &self,
        path: &Path,
        _structure: &StructureMap,
        content: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let source = Source::from_text(path, content);
        let tree = parse_source("python", &source)?;

        let mut findings = Vec::new();
        walk_preorder(tree.root_node(), |node| {
            if node.kind() != "except_clause" {
                return true;
            }
            // Anything besides the body names an exception type
            let bare = named_children(node)
                .iter()
                .all(|child| child.kind() == "block");
            if bare {
                let text = node_text(&source, node);
                let header = text.lines().next().unwrap_or_default().trim().to_string();
                findings.push(
                    self.descriptor
                        .finding(path, node.start_position().row as u32 + 1, None)
                        .at_column(node.start_position().column as u32 + 1)
                        .with_suggestion(
                            "Use 'except Exception:' or specific exception types",
                        )
                        .with_snippet(header),
                );
            }
            true
        });
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_only_bare_handlers() {
        let content = "\
try:
    run()
except:
    pass

try:
    run()
except ValueError as e:
    pass
except (KeyError, IndexError):
    pass
";
        let findings = BareExcept::new()
            .detect(Path::new("job.py"), &StructureMap::new(), content)
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
        assert_eq!(findings[0].column, 1);
        assert_eq!(findings[0].snippet.as_deref(), Some("except:"));
    }

    #[test]
    fn test_nested_bare_handler_column() {
        let content = "def f():\n    try:\n        g()\n    except:\n        raise\n";
        let findings = BareExcept::new()
            .detect(Path::new("job.py"), &StructureMap::new(), content)
            .unwrap();
        assert_eq!((findings[0].line, findings[0].column), (4, 5));
    }
}
