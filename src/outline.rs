//! Outline: nested view of a flat StructureMap
//!
//! Elements from every category are sorted by (start ascending, end
//! descending) so a container precedes the members that share its first
//! line. A single stack walk then assigns parents: closed ancestors are
//! popped, the stack top becomes the parent. Elements without an end line
//! are leaves and never open a scope.
//!
//! Ranges that overlap without nesting are attached to the most recently
//! opened ancestor that is still open. That is a best-effort recovery for
//! broken extractor output, not a containment guarantee.

use serde::Serialize;

use crate::extractors::base::{StructuralElement, StructureMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlineNode {
    pub category: String,
    pub element: StructuralElement,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    /// Total nodes in this subtree, including self
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

struct Slot<'a> {
    category: &'a str,
    element: &'a StructuralElement,
    children: Vec<usize>,
}

/// Build the outline roots for a structure, in source order
pub fn build_outline(structure: &StructureMap) -> Vec<OutlineNode> {
    let mut slots: Vec<Slot> = structure
        .all_elements()
        .map(|(category, element)| Slot {
            category,
            element,
            children: Vec::new(),
        })
        .collect();
    // stable: category order breaks exact ties
    slots.sort_by(|a, b| {
        a.element
            .start_line
            .cmp(&b.element.start_line)
            .then_with(|| b.element.last_line().cmp(&a.element.last_line()))
    });

    let mut roots: Vec<usize> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    for idx in 0..slots.len() {
        let start = slots[idx].element.start_line;
        while let Some(&top) = open.last() {
            if slots[top].element.last_line() < start {
                open.pop();
            } else {
                break;
            }
        }
        match open.last() {
            Some(&parent) => slots[parent].children.push(idx),
            None => roots.push(idx),
        }
        if slots[idx].element.end_line.is_some() {
            open.push(idx);
        }
    }

    // Children always sort after their parent, so building from the back
    // finishes every subtree before its parent needs it.
    let mut built: Vec<Option<OutlineNode>> = vec![None; slots.len()];
    for idx in (0..slots.len()).rev() {
        let children = slots[idx]
            .children
            .iter()
            .filter_map(|child| built[*child].take())
            .collect();
        built[idx] = Some(OutlineNode {
            category: slots[idx].category.to_string(),
            element: slots[idx].element.clone(),
            children,
        });
    }
    roots
        .into_iter()
        .filter_map(|idx| built[idx].take())
        .collect()
}

/// Visit every node depth-first with its depth (roots are depth 0)
pub fn walk_outline<'a, F>(roots: &'a [OutlineNode], mut visit: F)
where
    F: FnMut(&'a OutlineNode, usize),
{
    let mut stack: Vec<(&OutlineNode, usize)> = roots.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        visit(node, depth);
        for child in node.children.iter().rev() {
            stack.push((child, depth + 1));
        }
    }
}
