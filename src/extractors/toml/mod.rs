/// TOML extractor - tables as sections, top-level pairs as keys
///
/// - Regular tables: [table_name]
/// - Nested tables: [parent.child]
/// - Array tables: [[array_table]] (one element per occurrence, `array` metadata)
///
/// The deepest dotted header is recorded as the `nesting_depth` fact.
use std::sync::Arc;
use tree_sitter::Node;

use crate::extractors::base::tree_methods::{
    end_line, find_child_by_types, first_error_line, node_text, parse_source, start_line,
};
use crate::extractors::base::{
    BaseExtractor, ElementKind, Extractor, ExtractorFactory, StructuralElement,
};
use crate::source::Source;

const KEY_KINDS: &[&str] = &["bare_key", "quoted_key", "dotted_key"];

pub struct TomlExtractor {
    base: BaseExtractor,
}

impl TomlExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("toml", source);
        extract_tables(&mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(TomlExtractor::new(source)))
    }
}

impl Extractor for TomlExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }
}

fn extract_tables(base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);
    let tree = match parse_source("toml", &source) {
        Ok(tree) => tree,
        Err(e) => {
            base.structure.mark_malformed(e.to_string());
            return;
        }
    };
    let root = tree.root_node();
    if let Some(line) = first_error_line(&root) {
        base.structure.mark_malformed(format!("invalid TOML near line {}", line));
    }

    let mut nesting_depth = 0u32;
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "pair" => {
                let Some(name) = key_name(&source, &child) else {
                    continue;
                };
                nesting_depth = nesting_depth.max(segments(&name));
                let element = StructuralElement::new(ElementKind::Key, name, start_line(&child))
                    .with_end_line(end_line(&child))
                    .with_depth(0);
                base.push("keys", element);
            }
            "table" | "table_array_element" => {
                let Some(name) = key_name(&source, &child) else {
                    continue;
                };
                nesting_depth = nesting_depth.max(segments(&name));
                let mut pairs = child.walk();
                let key_count = child
                    .named_children(&mut pairs)
                    .filter(|n| n.kind() == "pair")
                    .count();
                let mut element =
                    StructuralElement::new(ElementKind::Section, name, start_line(&child))
                        .with_end_line(end_line(&child))
                        .with_depth(0)
                        .with_extra("keys", key_count);
                if child.kind() == "table_array_element" {
                    element = element.with_extra("array", true);
                }
                base.push("sections", element);
            }
            _ => {}
        }
    }
    base.structure.set_fact("nesting_depth", nesting_depth);
}

fn key_name(source: &Source, node: &Node) -> Option<String> {
    let key = find_child_by_types(node, KEY_KINDS)?;
    let text = node_text(source, &key);
    let name: Vec<&str> = text
        .split('.')
        .map(|part| part.trim().trim_matches('"').trim_matches('\''))
        .collect();
    Some(name.join("."))
}

fn segments(name: &str) -> u32 {
    name.split('.').count() as u32
}
