// Base Extractor Types
//
// StructuralElement / StructureMap are the normalized model every extractor
// produces, whatever the file format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Element kinds - the category tag of a structural element
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Import,
    Function,
    Method,
    Class,
    Struct,
    Interface,
    Enum,
    Trait,
    Impl,
    Module,
    Type,
    Constant,
    Signal,
    Section,
    Key,
    Table,
    View,
    Index,
    Routine,
    Trigger,
    Record,
    Cell,
    Server,
    Location,
    Upstream,
    Stage,
    Instruction,
    #[serde(rename = "code_block")]
    CodeBlock,
    Link,
    Comment,
}

impl ElementKind {
    /// Category a kind lands in when an extractor does not say otherwise
    pub fn default_category(&self) -> &'static str {
        match self {
            ElementKind::Import => "imports",
            ElementKind::Function | ElementKind::Method => "functions",
            ElementKind::Class => "classes",
            ElementKind::Struct => "structs",
            ElementKind::Interface => "interfaces",
            ElementKind::Enum => "enums",
            ElementKind::Trait => "traits",
            ElementKind::Impl => "impls",
            ElementKind::Module => "modules",
            ElementKind::Type => "types",
            ElementKind::Constant => "constants",
            ElementKind::Signal => "signals",
            ElementKind::Section => "sections",
            ElementKind::Key => "keys",
            ElementKind::Table => "tables",
            ElementKind::View => "views",
            ElementKind::Index => "indexes",
            ElementKind::Routine => "routines",
            ElementKind::Trigger => "triggers",
            ElementKind::Record => "records",
            ElementKind::Cell => "cells",
            ElementKind::Server => "servers",
            ElementKind::Location => "locations",
            ElementKind::Upstream => "upstreams",
            ElementKind::Stage => "stages",
            ElementKind::Instruction => "instructions",
            ElementKind::CodeBlock => "code_blocks",
            ElementKind::Link => "links",
            ElementKind::Comment => "comments",
        }
    }

    /// Whether the kind is callable code (used by complexity detectors)
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            ElementKind::Function | ElementKind::Method | ElementKind::Routine
        )
    }

    /// Convert from a kind or category name ("function", "functions", ...)
    pub fn from_string(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        let kind = match lower.as_str() {
            "import" | "imports" => ElementKind::Import,
            "function" | "functions" => ElementKind::Function,
            "method" | "methods" => ElementKind::Method,
            "class" | "classes" => ElementKind::Class,
            "struct" | "structs" => ElementKind::Struct,
            "interface" | "interfaces" => ElementKind::Interface,
            "enum" | "enums" => ElementKind::Enum,
            "trait" | "traits" => ElementKind::Trait,
            "impl" | "impls" => ElementKind::Impl,
            "module" | "modules" | "namespace" | "namespaces" => ElementKind::Module,
            "type" | "types" => ElementKind::Type,
            "constant" | "constants" => ElementKind::Constant,
            "signal" | "signals" => ElementKind::Signal,
            "section" | "sections" | "heading" | "headings" => ElementKind::Section,
            "key" | "keys" => ElementKind::Key,
            "table" | "tables" => ElementKind::Table,
            "view" | "views" => ElementKind::View,
            "index" | "indexes" => ElementKind::Index,
            "routine" | "routines" | "procedure" | "procedures" => ElementKind::Routine,
            "trigger" | "triggers" => ElementKind::Trigger,
            "record" | "records" => ElementKind::Record,
            "cell" | "cells" => ElementKind::Cell,
            "server" | "servers" => ElementKind::Server,
            "location" | "locations" => ElementKind::Location,
            "upstream" | "upstreams" => ElementKind::Upstream,
            "stage" | "stages" => ElementKind::Stage,
            "instruction" | "instructions" => ElementKind::Instruction,
            "code_block" | "code_blocks" => ElementKind::CodeBlock,
            "link" | "links" => ElementKind::Link,
            "comment" | "comments" => ElementKind::Comment,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ElementKind::CodeBlock => "code_block",
            other => {
                let category = other.default_category();
                // "classes" -> "class", "indexes" -> "index", "functions" -> "function"
                let singular = category
                    .strip_suffix("es")
                    .filter(|stem| stem.ends_with("ss") || stem.ends_with('x'))
                    .unwrap_or_else(|| category.strip_suffix('s').unwrap_or(category));
                return write!(f, "{}", singular);
            }
        };
        write!(f, "{}", name)
    }
}

/// Whether a category name matches a query, tolerating singular/plural forms
pub fn category_matches(category: &str, query: &str) -> bool {
    if query.is_empty() || category.eq_ignore_ascii_case(query) {
        return true;
    }
    let category = category.to_ascii_lowercase();
    let query = query.to_ascii_lowercase();
    category == format!("{}s", query)
        || category == format!("{}es", query)
        || query == format!("{}s", category)
}

/// Free-form per-element facts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementMetadata {
    /// Signature text (parameters and return type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_count: Option<u32>,
    /// Number of enclosing extracted elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A named, line-ranged unit of a file (function, class, section, key, ...)
///
/// Invariant: `start_line >= 1` and `end_line >= start_line` when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralElement {
    pub kind: ElementKind,
    pub name: String,
    /// Start line number (1-based)
    pub start_line: u32,
    /// End line number (1-based, inclusive); `None` for zero-span elements
    pub end_line: Option<u32>,
    #[serde(default)]
    pub metadata: ElementMetadata,
}

impl StructuralElement {
    pub fn new(kind: ElementKind, name: impl Into<String>, start_line: u32) -> Self {
        Self {
            kind,
            name: name.into(),
            start_line: start_line.max(1),
            end_line: None,
            metadata: ElementMetadata::default(),
        }
    }

    pub fn with_end_line(mut self, end_line: u32) -> Self {
        self.end_line = Some(end_line.max(self.start_line));
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.metadata.signature = Some(signature.into());
        self
    }

    pub fn with_parameter_count(mut self, count: u32) -> Self {
        self.metadata.parameter_count = Some(count);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.metadata.depth = Some(depth);
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.extra.insert(key.to_string(), value.into());
        self
    }

    /// Last line covered (start line for zero-span elements)
    pub fn last_line(&self) -> u32 {
        self.end_line.unwrap_or(self.start_line)
    }

    pub fn line_count(&self) -> u32 {
        self.last_line() - self.start_line + 1
    }

    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.start_line && line <= self.last_line()
    }

    /// Range containment (inclusive)
    pub fn contains(&self, other: &StructuralElement) -> bool {
        other.start_line >= self.start_line && other.last_line() <= self.last_line()
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.metadata.extra.get(key).and_then(|v| v.as_str())
    }
}

/// One category of a StructureMap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub elements: Vec<StructuralElement>,
}

/// Per-category listing of a file's elements, categories in insertion order,
/// elements in source order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureMap {
    categories: Vec<CategoryEntry>,
    /// File-level facts (record type counts, nesting depth, kernel name, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facts: BTreeMap<String, serde_json::Value>,
    /// Set when the parse failed or recovered from errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malformed: Option<String>,
}

impl StructureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a category exists, even if it stays empty
    pub fn ensure_category(&mut self, category: &str) -> &mut Vec<StructuralElement> {
        let position = match self.categories.iter().position(|c| c.name == category) {
            Some(position) => position,
            None => {
                self.categories.push(CategoryEntry {
                    name: category.to_string(),
                    elements: Vec::new(),
                });
                self.categories.len() - 1
            }
        };
        &mut self.categories[position].elements
    }

    pub fn push(&mut self, category: &str, element: StructuralElement) {
        self.ensure_category(category).push(element);
    }

    /// Elements of a category (singular or plural name accepted)
    pub fn get(&self, category: &str) -> &[StructuralElement] {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .or_else(|| {
                self.categories
                    .iter()
                    .find(|c| category_matches(&c.name, category))
            })
            .map(|c| c.elements.as_slice())
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryEntry> {
        self.categories.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CategoryEntry> {
        self.categories.iter_mut()
    }

    /// Every element with its category, category by category
    pub fn all_elements(&self) -> impl Iterator<Item = (&str, &StructuralElement)> {
        self.categories
            .iter()
            .flat_map(|c| c.elements.iter().map(move |e| (c.name.as_str(), e)))
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.elements.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove_empty(&mut self) {
        self.categories.retain(|c| !c.elements.is_empty());
    }

    /// Keep every category in source order
    pub fn sort_by_line(&mut self) {
        for category in &mut self.categories {
            category
                .elements
                .sort_by_key(|e| (e.start_line, std::cmp::Reverse(e.last_line())));
        }
    }

    pub fn mark_malformed(&mut self, reason: impl Into<String>) {
        if self.malformed.is_none() {
            self.malformed = Some(reason.into());
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed.is_some()
    }

    pub fn set_fact(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.facts.insert(key.to_string(), value.into());
    }
}

/// Result of `extract_element`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedElement {
    pub name: String,
    pub category: String,
    pub kind: ElementKind,
    pub source_text: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_invariants_are_enforced() {
        let element = StructuralElement::new(ElementKind::Function, "f", 0).with_end_line(0);
        assert_eq!(element.start_line, 1);
        assert_eq!(element.end_line, Some(1));

        let element = StructuralElement::new(ElementKind::Function, "g", 10).with_end_line(4);
        assert_eq!(element.end_line, Some(10));
    }

    #[test]
    fn test_kind_display_is_singular() {
        assert_eq!(ElementKind::Function.to_string(), "function");
        assert_eq!(ElementKind::Class.to_string(), "class");
        assert_eq!(ElementKind::Index.to_string(), "index");
        assert_eq!(ElementKind::CodeBlock.to_string(), "code_block");
        assert_eq!(ElementKind::Key.to_string(), "key");
    }

    #[test]
    fn test_category_matching_tolerates_plurals() {
        assert!(category_matches("functions", "function"));
        assert!(category_matches("classes", "class"));
        assert!(category_matches("functions", "FUNCTIONS"));
        assert!(category_matches("functions", ""));
        assert!(!category_matches("functions", "class"));
    }

    #[test]
    fn test_structure_map_keeps_category_insertion_order() {
        let mut map = StructureMap::new();
        map.push("imports", StructuralElement::new(ElementKind::Import, "os", 1));
        map.push("functions", StructuralElement::new(ElementKind::Function, "a", 3));
        map.push("imports", StructuralElement::new(ElementKind::Import, "sys", 2));
        map.ensure_category("classes");

        let names: Vec<&str> = map.categories().collect();
        assert_eq!(names, vec!["imports", "functions", "classes"]);
        assert_eq!(map.get("import").len(), 2);
        assert_eq!(map.len(), 3);

        map.remove_empty();
        assert_eq!(map.categories().count(), 2);
    }

    #[test]
    fn test_from_string_round_trips_categories() {
        for kind in [
            ElementKind::Function,
            ElementKind::Class,
            ElementKind::Section,
            ElementKind::Index,
            ElementKind::CodeBlock,
        ] {
            assert_eq!(ElementKind::from_string(kind.default_category()), Some(kind));
        }
        assert_eq!(ElementKind::from_string("widgets"), None);
    }
}
