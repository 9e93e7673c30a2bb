// Tree navigation helpers shared by the syntax-tree-backed extractors
//
// Node text is always sliced from the raw byte buffer: tree-sitter offsets are
// byte offsets, and multi-byte characters would shift a char-based slice.

use anyhow::{anyhow, Result};
use tree_sitter::{Node, Parser, Tree};

use crate::language::get_tree_sitter_language;
use crate::source::Source;

/// Parse a source with the named grammar
pub fn parse_source(grammar: &str, source: &Source) -> Result<Tree> {
    let language = get_tree_sitter_language(grammar)?;
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| anyhow!("Failed to set {} grammar: {}", grammar, e))?;
    parser
        .parse(source.bytes(), None)
        .ok_or_else(|| anyhow!("Parser returned no tree for {}", source.path().display()))
}

/// Get text from a tree-sitter node
pub fn node_text(source: &Source, node: &Node) -> String {
    source.byte_text(node.start_byte(), node.end_byte())
}

/// 1-based start line
pub fn start_line(node: &Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based inclusive end line
///
/// A node ending at column 0 stops before that row (trailing newline).
pub fn end_line(node: &Node) -> u32 {
    let start = node.start_position();
    let end = node.end_position();
    if end.column == 0 && end.row > start.row {
        end.row as u32
    } else {
        end.row as u32 + 1
    }
}

/// Find child by multiple types
pub fn find_child_by_types<'a>(node: &Node<'a>, types: &[&str]) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|child| types.contains(&child.kind()));
    found
}

/// Named children, comments excluded
pub fn named_children<'a>(node: &Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.kind().contains("comment"))
        .collect()
}

/// Line of the first ERROR or MISSING node, if the tree has any
pub fn first_error_line(root: &Node) -> Option<u32> {
    if !root.has_error() {
        return None;
    }
    let mut stack = vec![*root];
    let mut first: Option<u32> = None;
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let line = start_line(&node);
            first = Some(first.map_or(line, |f| f.min(line)));
            continue;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.has_error() || child.is_missing() {
                stack.push(child);
            }
        }
    }
    first.or(Some(start_line(root)))
}

/// Iterative pre-order walk; `visit` returns false to skip a subtree
pub fn walk_preorder<'a, F>(root: Node<'a>, mut visit: F)
where
    F: FnMut(&Node<'a>) -> bool,
{
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !visit(&node) {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'a>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}
