/// JSON extractor - top-level keys as structural elements
///
/// Each top-level pair becomes a `keys` element spanning its value, with the
/// value type and container size as metadata. The document's nesting depth
/// and root type are recorded as file-level facts.
use std::sync::Arc;
use tree_sitter::Node;

use crate::extractors::base::tree_methods::{
    end_line, first_error_line, named_children, node_text, parse_source, start_line,
};
use crate::extractors::base::{
    BaseExtractor, ElementKind, Extractor, ExtractorFactory, StructuralElement,
};
use crate::source::Source;

pub struct JsonExtractor {
    base: BaseExtractor,
}

impl JsonExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("json", source);
        extract_keys(&mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(JsonExtractor::new(source)))
    }
}

impl Extractor for JsonExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }
}

fn extract_keys(base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);
    let tree = match parse_source("json", &source) {
        Ok(tree) => tree,
        Err(e) => {
            base.structure.mark_malformed(e.to_string());
            return;
        }
    };
    let root = tree.root_node();
    if let Some(line) = first_error_line(&root) {
        base.structure.mark_malformed(format!("invalid JSON near line {}", line));
    }

    let Some(value) = named_children(&root).into_iter().next() else {
        return;
    };
    base.structure.set_fact("root_type", value_type(&value));
    base.structure.set_fact("max_depth", nesting_depth(value));

    if value.kind() != "object" {
        return;
    }
    for pair in named_children(&value) {
        if pair.kind() != "pair" {
            continue;
        }
        let (Some(key), Some(val)) = (
            pair.child_by_field_name("key"),
            pair.child_by_field_name("value"),
        ) else {
            continue;
        };
        let name = unquote(&node_text(&source, &key));
        let mut element = StructuralElement::new(ElementKind::Key, name, start_line(&pair))
            .with_end_line(end_line(&pair))
            .with_depth(0)
            .with_extra("type", value_type(&val));
        if matches!(val.kind(), "object" | "array") {
            let size = named_children(&val).len();
            element = element.with_extra("size", size);
        }
        base.push("keys", element);
    }
}

pub(crate) fn unquote(text: &str) -> String {
    text.trim().trim_matches('"').to_string()
}

pub(crate) fn value_type(node: &Node) -> &'static str {
    match node.kind() {
        "object" => "object",
        "array" => "array",
        "string" => "string",
        "number" => "number",
        "true" | "false" => "boolean",
        "null" => "null",
        _ => "unknown",
    }
}

/// Deepest object/array nesting, walked iteratively
fn nesting_depth(root: Node) -> u32 {
    let mut max = 0u32;
    let mut stack = vec![(root, 0u32)];
    while let Some((node, depth)) = stack.pop() {
        let depth = if matches!(node.kind(), "object" | "array") {
            depth + 1
        } else {
            depth
        };
        max = max.max(depth);
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            stack.push((child, depth));
        }
    }
    max
}
