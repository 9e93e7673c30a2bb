// Signature and parameter-count extraction for callable elements

use tree_sitter::Node;

use crate::extractors::base::tree_methods::{find_child_by_types, named_children, node_text};
use crate::extractors::base::truncate_chars;
use crate::source::Source;

const PARAMETER_LIST_KINDS: &[&str] = &[
    "parameters",
    "parameter_list",
    "formal_parameters",
    "formal_parameter_list",
    "function_value_parameters",
    "method_parameters",
    "lambda_parameters",
];

const RETURN_FIELDS: &[&str] = &["return_type", "result", "returns"];

/// Receivers and separators that are not real parameters
const NON_PARAMETERS: &[&str] = &["self", "&self", "&mut self", "mut self", "cls", "void"];
const NON_PARAMETER_KINDS: &[&str] = &[
    "self_parameter",
    "keyword_separator",
    "positional_separator",
    "list_splat_pattern_separator",
];

const MAX_SIGNATURE_CHARS: usize = 200;

pub(super) struct Signature {
    pub text: String,
    pub parameter_count: Option<u32>,
}

pub(super) fn signature(source: &Source, node: &Node) -> Option<Signature> {
    match parameter_list(node) {
        Some(params) => {
            let mut text = collapse(&node_text(source, &params));
            if let Some(ret) = return_type(source, node) {
                text = format!("{} -> {}", text, ret);
            }
            Some(Signature {
                text: truncate_chars(&text, MAX_SIGNATURE_CHARS),
                parameter_count: Some(count_parameters(source, &params)),
            })
        }
        None => header_signature(source, node),
    }
}

/// Parameter list node: `parameters` field, then the C declarator chain,
/// then any direct child of a known list kind
fn parameter_list<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    if let Some(params) = node
        .child_by_field_name("parameters")
        .or_else(|| node.child_by_field_name("parameter"))
    {
        return Some(params);
    }

    let mut current = node.child_by_field_name("declarator");
    while let Some(declarator) = current {
        if let Some(params) = declarator.child_by_field_name("parameters") {
            return Some(params);
        }
        current = declarator.child_by_field_name("declarator");
    }

    find_child_by_types(node, PARAMETER_LIST_KINDS)
}

fn return_type(source: &Source, node: &Node) -> Option<String> {
    let ret = RETURN_FIELDS
        .iter()
        .find_map(|field| node.child_by_field_name(field))?;
    let text = collapse(&node_text(source, &ret));
    let text = text.trim_start_matches("->").trim_start_matches(':').trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn count_parameters(source: &Source, params: &Node) -> u32 {
    // A lone identifier is an unparenthesized arrow-function parameter
    if params.kind() == "identifier" {
        return 1;
    }

    let mut count = 0;
    for param in named_children(params) {
        if NON_PARAMETER_KINDS.contains(&param.kind()) {
            continue;
        }
        let text = collapse(&node_text(source, &param));
        if NON_PARAMETERS.contains(&text.as_str()) {
            continue;
        }
        // Go groups names sharing a type: `a, b int`
        let mut cursor = param.walk();
        let names = param.children_by_field_name("name", &mut cursor).count() as u32;
        count += names.max(1);
    }
    count
}

/// Parenthesized text of the declaration header, for grammars without a
/// parameter list node (parameters as direct children)
fn header_signature(source: &Source, node: &Node) -> Option<Signature> {
    let text = node_text(source, node);
    let header = text.split('{').next().unwrap_or("");
    let open = header.find('(')?;
    let close = header.rfind(')')?;
    if close < open {
        return None;
    }

    let mut cursor = node.walk();
    let direct = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "parameter")
        .count() as u32;

    Some(Signature {
        text: truncate_chars(&collapse(&header[open..=close]), MAX_SIGNATURE_CHARS),
        parameter_count: Some(direct),
    })
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
