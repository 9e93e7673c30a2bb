/// YAML extractor - mapping keys ranged by indentation
///
/// Top-level keys land in `keys` and span up to the next top-level key;
/// nested mapping keys (down to `MAX_NESTED_DEPTH`) land in `nested_keys`.
/// A `---` separator closes every open key. Block scalar bodies (`|`, `>`)
/// are skipped so their contents are never read as keys.
///
/// Common use cases:
/// - CI/CD configs (GitHub Actions, GitLab CI)
/// - Kubernetes manifests
/// - Docker Compose files
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::extractors::base::{
    BaseExtractor, ElementKind, Extractor, ExtractorFactory, StructuralElement,
};
use crate::source::Source;

const MAX_NESTED_DEPTH: usize = 3;

static KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\s*)(-\s+)?("(?:[^"\\]|\\.)*"|'[^']*'|[A-Za-z_$][\w.\-/$]*)\s*:(?:\s+(.*))?$"#)
        .expect("valid YAML key regex")
});

pub struct YamlExtractor {
    base: BaseExtractor,
}

impl YamlExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("yaml", source);
        extract_keys(&mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(YamlExtractor::new(source)))
    }
}

impl Extractor for YamlExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }
}

struct OpenKey {
    indent: usize,
    /// Index into the collected elements; None beyond the depth limit
    index: Option<usize>,
}

fn extract_keys(base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);

    let mut elements: Vec<(&'static str, StructuralElement)> = Vec::new();
    let mut open: Vec<OpenKey> = Vec::new();
    let mut block_scalar_indent: Option<usize> = None;
    let mut last_content: u32 = 0;
    let mut documents = 0u32;
    let mut document_has_content = false;
    let mut tab_line: Option<u32> = None;

    let close = |open: &mut Vec<OpenKey>,
                 elements: &mut Vec<(&'static str, StructuralElement)>,
                 min_indent: usize,
                 end: u32| {
        while open.last().is_some_and(|k| k.indent >= min_indent) {
            if let Some(OpenKey {
                index: Some(index), ..
            }) = open.pop()
            {
                let element = &mut elements[index].1;
                element.end_line = Some(end.max(element.start_line));
            }
        }
    };

    for (idx, line) in source.lines().iter().enumerate() {
        let line_no = idx as u32 + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        if line[..indent].contains('\t') && tab_line.is_none() {
            tab_line = Some(line_no);
        }

        if let Some(block_indent) = block_scalar_indent {
            if indent > block_indent {
                last_content = line_no;
                continue;
            }
            block_scalar_indent = None;
        }

        if trimmed == "---" || trimmed.starts_with("--- ") || trimmed == "..." {
            close(&mut open, &mut elements, 0, last_content);
            if document_has_content {
                documents += 1;
                document_has_content = false;
            }
            continue;
        }

        if let Some(caps) = KEY.captures(line) {
            let dash = caps.get(2).map_or(0, |m| m.as_str().len());
            let key_indent = indent + dash;
            close(&mut open, &mut elements, key_indent, last_content);

            let depth = open.len();
            let name = caps[3].trim_matches('"').trim_matches('\'').to_string();
            let value = caps.get(4).map_or("", |m| m.as_str()).trim();
            if value.starts_with('|') || value.starts_with('>') {
                block_scalar_indent = Some(key_indent);
            }

            let index = if depth <= MAX_NESTED_DEPTH {
                let category = if depth == 0 { "keys" } else { "nested_keys" };
                let mut element = StructuralElement::new(ElementKind::Key, name, line_no)
                    .with_end_line(line_no)
                    .with_depth(depth as u32);
                if dash > 0 {
                    element = element.with_extra("list_item", true);
                }
                elements.push((category, element));
                Some(elements.len() - 1)
            } else {
                None
            };
            open.push(OpenKey {
                indent: key_indent,
                index,
            });
        }
        last_content = line_no;
        document_has_content = true;
    }
    close(&mut open, &mut elements, 0, last_content);
    if document_has_content {
        documents += 1;
    }

    if let Some(line) = tab_line {
        base.structure.mark_malformed(format!("tab indentation at line {}", line));
    }
    base.structure.set_fact("documents", documents);
    base.structure.ensure_category("keys");
    for (category, element) in elements {
        base.push(category, element);
    }
    base.structure.remove_empty();
}
