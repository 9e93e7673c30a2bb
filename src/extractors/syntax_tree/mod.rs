// Syntax-tree-backed extractor
//
// One generic walker driven by a per-language table (GrammarSpec): which
// node kinds become elements, in which category, and how their names are
// read. Adding a language is a table, not a new extractor.

pub mod grammars;
mod signatures;

use std::sync::Arc;
use tracing::debug;
use tree_sitter::Node;

use crate::extractors::base::tree_methods::{
    end_line, first_error_line, node_text, parse_source, start_line,
};
use crate::extractors::base::{
    truncate_chars, BaseExtractor, ElementKind, Extractor, ExtractorFactory, StructuralElement,
};
use crate::source::Source;

/// Node kinds that hold a plain identifier
const NAME_KINDS: &[&str] = &[
    "identifier",
    "name",
    "word",
    "type_identifier",
    "simple_identifier",
    "property_identifier",
    "field_identifier",
    "constant",
];

const MAX_NAME_CHARS: usize = 120;

/// How an element's name is read from its node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Naming {
    /// Named field, falling back to the first identifier-like child
    Field(String),
    /// Follow `declarator` fields down to the identifier (C family)
    Declarator,
    /// First line of the node text (imports, tests)
    FirstLine,
    /// `Type` or `Trait for Type` (Rust impl blocks)
    ImplHeader,
    /// Fixed name (constructors with no name node)
    Literal(String),
}

/// Extra condition a node must meet to match a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRequirement {
    pub field: String,
    /// Accepted node kinds for the field; empty accepts any
    pub kinds: Vec<String>,
}

/// Maps one node kind to an element kind and category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRule {
    pub node_kind: String,
    pub category: String,
    pub kind: ElementKind,
    pub naming: Naming,
    pub requires: Option<FieldRequirement>,
    /// Read parameters from this field's node instead of the node itself
    pub signature_field: Option<String>,
}

impl NodeRule {
    pub fn new(node_kind: &str, category: &str, kind: ElementKind) -> Self {
        Self {
            node_kind: node_kind.to_string(),
            category: category.to_string(),
            kind,
            naming: Naming::Field("name".to_string()),
            requires: None,
            signature_field: None,
        }
    }

    pub fn named_by(mut self, naming: Naming) -> Self {
        self.naming = naming;
        self
    }

    pub fn requires_field(mut self, field: &str, kinds: &[&str]) -> Self {
        self.requires = Some(FieldRequirement {
            field: field.to_string(),
            kinds: kinds.iter().map(|k| k.to_string()).collect(),
        });
        self
    }

    pub fn signature_from(mut self, field: &str) -> Self {
        self.signature_field = Some(field.to_string());
        self
    }

    fn matches(&self, node: &Node) -> bool {
        if node.kind() != self.node_kind {
            return false;
        }
        match &self.requires {
            None => true,
            Some(req) => match node.child_by_field_name(&req.field) {
                Some(child) => req.kinds.is_empty() || req.kinds.iter().any(|k| k == child.kind()),
                None => false,
            },
        }
    }
}

/// Per-language extraction table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarSpec {
    /// Extractor id reported in results
    pub id: String,
    /// Grammar name understood by `get_tree_sitter_language`
    pub grammar: String,
    pub rules: Vec<NodeRule>,
}

impl GrammarSpec {
    pub fn new(id: &str, grammar: &str) -> Self {
        Self {
            id: id.to_string(),
            grammar: grammar.to_string(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: NodeRule) -> Self {
        self.rules.push(rule);
        self
    }

    fn rule_for(&self, node: &Node) -> Option<&NodeRule> {
        self.rules.iter().find(|rule| rule.matches(node))
    }
}

/// Extractor over any grammar described by a GrammarSpec
pub struct SyntaxTreeExtractor {
    base: BaseExtractor,
}

impl SyntaxTreeExtractor {
    pub fn new(spec: &GrammarSpec, source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new(spec.id.clone(), source);
        extract_elements(spec, &mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory(spec: GrammarSpec) -> ExtractorFactory {
        let spec = Arc::new(spec);
        Arc::new(move |source| Box::new(SyntaxTreeExtractor::new(&spec, source)))
    }
}

impl Extractor for SyntaxTreeExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }
}

/// Walk the tree and record every node a rule claims
///
/// The walk is iterative so deeply nested input cannot exhaust the stack.
fn extract_elements(spec: &GrammarSpec, base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);
    let tree = match parse_source(&spec.grammar, &source) {
        Ok(tree) => tree,
        Err(e) => {
            base.structure.mark_malformed(e.to_string());
            return;
        }
    };
    let root = tree.root_node();
    if let Some(line) = first_error_line(&root) {
        base.structure.mark_malformed(format!("syntax error near line {}", line));
    }

    // (node, number of enclosing elements, kind of the innermost one)
    let mut stack: Vec<(Node, u32, Option<ElementKind>)> = vec![(root, 0, None)];
    while let Some((node, depth, enclosing)) = stack.pop() {
        let mut child_depth = depth;
        let mut child_enclosing = enclosing;

        if let Some(rule) = spec.rule_for(&node) {
            if let Some(name) = element_name(&source, &node, &rule.naming) {
                let kind = refine_kind(rule.kind, enclosing);
                let mut element = StructuralElement::new(kind, name, start_line(&node))
                    .with_end_line(end_line(&node))
                    .with_depth(depth);

                if kind.is_callable() {
                    let target = rule
                        .signature_field
                        .as_deref()
                        .and_then(|field| node.child_by_field_name(field))
                        .unwrap_or(node);
                    if let Some(sig) = signatures::signature(&source, &target) {
                        element = element.with_signature(sig.text);
                        if let Some(count) = sig.parameter_count {
                            element = element.with_parameter_count(count);
                        }
                    }
                }

                base.push(&rule.category, element);
                child_depth = depth + 1;
                child_enclosing = Some(kind);
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push((child, child_depth, child_enclosing));
        }
    }

    debug!(
        "Extracted {} elements from {} with {} grammar",
        base.structure.len(),
        source.path().display(),
        spec.grammar
    );
}

/// Functions nested directly in a type body are methods
fn refine_kind(kind: ElementKind, enclosing: Option<ElementKind>) -> ElementKind {
    match (kind, enclosing) {
        (
            ElementKind::Function,
            Some(
                ElementKind::Class
                | ElementKind::Struct
                | ElementKind::Interface
                | ElementKind::Trait
                | ElementKind::Impl
                | ElementKind::Enum,
            ),
        ) => ElementKind::Method,
        (kind, _) => kind,
    }
}

fn element_name(source: &Source, node: &Node, naming: &Naming) -> Option<String> {
    let name = match naming {
        Naming::Field(field) => node
            .child_by_field_name(field)
            .map(|n| node_text(source, &n))
            .or_else(|| first_identifier(source, node)),
        Naming::Declarator => declarator_name(source, node),
        Naming::FirstLine => node_text(source, node)
            .lines()
            .next()
            .map(|line| line.trim().to_string()),
        Naming::ImplHeader => {
            let ty = node.child_by_field_name("type").map(|n| node_text(source, &n))?;
            match node.child_by_field_name("trait") {
                Some(tr) => Some(format!("{} for {}", node_text(source, &tr), ty)),
                None => Some(ty),
            }
        }
        Naming::Literal(name) => Some(name.clone()),
    }?;

    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return None;
    }
    Some(truncate_chars(&name, MAX_NAME_CHARS))
}

fn first_identifier(source: &Source, node: &Node) -> Option<String> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| NAME_KINDS.contains(&child.kind()));
    found.map(|n| node_text(source, &n))
}

/// `int *(*make)(void)` -> `make`
fn declarator_name(source: &Source, node: &Node) -> Option<String> {
    let mut current = node.child_by_field_name("declarator")?;
    while let Some(inner) = current.child_by_field_name("declarator") {
        current = inner;
    }
    match current.kind() {
        "identifier"
        | "field_identifier"
        | "type_identifier"
        | "qualified_identifier"
        | "destructor_name"
        | "operator_name"
        | "primitive_type" => Some(node_text(source, &current)),
        _ => first_identifier(source, &current),
    }
}
