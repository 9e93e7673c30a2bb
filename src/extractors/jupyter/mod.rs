/// Jupyter notebook extractor - one `cells` element per notebook cell
///
/// Cell content comes from serde_json; cell line spans come from the JSON
/// syntax tree, so each element covers the cell's object in the raw file.
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tree_sitter::Node;

use super::json::unquote;
use crate::extractors::base::tree_methods::{
    end_line, named_children, node_text, parse_source, start_line,
};
use crate::extractors::base::{
    truncate_chars, BaseExtractor, ElementKind, Extractor, ExtractorFactory, StructuralElement,
};
use crate::source::Source;

const FIRST_LINE_CHARS: usize = 50;

pub struct JupyterExtractor {
    base: BaseExtractor,
}

impl JupyterExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("jupyter", source);
        extract_cells(&mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(JupyterExtractor::new(source)))
    }
}

impl Extractor for JupyterExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }
}

fn extract_cells(base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);
    let notebook: Value = match serde_json::from_str(source.text()) {
        Ok(value) => value,
        Err(e) => {
            base.structure
                .mark_malformed(format!("invalid notebook JSON: {}", e));
            return;
        }
    };

    let kernel = notebook
        .pointer("/metadata/kernelspec/display_name")
        .or_else(|| notebook.pointer("/metadata/kernelspec/name"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let language = notebook
        .pointer("/metadata/language_info/name")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    base.structure.set_fact("kernel", kernel);
    base.structure.set_fact("language", language);
    if let Some(nbformat) = notebook.get("nbformat") {
        base.structure.set_fact("nbformat", nbformat.clone());
    }

    let cells = notebook
        .get("cells")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let spans = cell_spans(&source);

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (idx, cell) in cells.iter().enumerate() {
        let cell_type = cell
            .get("cell_type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        *counts.entry(cell_type.to_string()).or_default() += 1;

        let source_lines = cell_source_lines(cell.get("source"));
        let first_line = source_lines
            .first()
            .map(|line| truncate_chars(line.trim(), FIRST_LINE_CHARS))
            .unwrap_or_default();
        let outputs = cell
            .get("outputs")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let (start, end) = spans.get(idx).copied().unwrap_or((1, 1));

        let element = StructuralElement::new(
            ElementKind::Cell,
            format!("[{}] {}", idx + 1, cell_type),
            start,
        )
        .with_end_line(end)
        .with_depth(0)
        .with_extra("type", cell_type)
        .with_extra("first_line", first_line)
        .with_extra(
            "execution_count",
            cell.get("execution_count").cloned().unwrap_or(Value::Null),
        )
        .with_extra("outputs", outputs)
        .with_extra("source_lines", source_lines.len());
        base.push("cells", element);
    }

    base.structure.set_fact("total_cells", cells.len());
    base.structure.set_fact("cell_counts", serde_json::json!(counts));
}

/// `source` is either one string or a list of line strings
fn cell_source_lines(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(text)) => text.lines().map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|line| line.trim_end_matches('\n').to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Line span of every object in the top-level `cells` array
fn cell_spans(source: &Source) -> Vec<(u32, u32)> {
    let Ok(tree) = parse_source("json", source) else {
        return Vec::new();
    };
    let root = tree.root_node();
    let Some(document) = named_children(&root).into_iter().next() else {
        return Vec::new();
    };
    let Some(cells) = top_level_value(source, &document, "cells") else {
        return Vec::new();
    };
    named_children(&cells)
        .iter()
        .filter(|node| node.kind() == "object")
        .map(|node| (start_line(node), end_line(node)))
        .collect()
}

fn top_level_value<'t>(source: &Source, object: &Node<'t>, key: &str) -> Option<Node<'t>> {
    named_children(object)
        .into_iter()
        .filter(|pair| pair.kind() == "pair")
        .find(|pair| {
            pair.child_by_field_name("key")
                .is_some_and(|k| unquote(&node_text(source, &k)) == key)
        })
        .and_then(|pair| pair.child_by_field_name("value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTEBOOK: &str = r##"{
 "cells": [
  {
   "cell_type": "markdown",
   "metadata": {},
   "source": ["# Analysis\n", "Some notes"]
  },
  {
   "cell_type": "code",
   "execution_count": 3,
   "metadata": {},
   "outputs": [{"output_type": "stream"}],
   "source": ["import pandas as pd\n", "df = pd.read_csv('x.csv')"]
  }
 ],
 "metadata": {
  "kernelspec": {"display_name": "Python 3", "name": "python3"},
  "language_info": {"name": "python"}
 },
 "nbformat": 4
}
"##;

    fn extract(text: &str) -> JupyterExtractor {
        JupyterExtractor::new(Arc::new(Source::from_text("analysis.ipynb", text)))
    }

    #[test]
    fn test_cells_with_spans_and_metadata() {
        let extractor = extract(NOTEBOOK);
        let structure = extractor.structure();
        let cells = structure.get("cells");
        assert_eq!(cells.len(), 2);

        assert_eq!(cells[0].name, "[1] markdown");
        assert_eq!((cells[0].start_line, cells[0].end_line), (3, Some(7)));
        assert_eq!(cells[0].extra_str("first_line"), Some("# Analysis"));

        assert_eq!(cells[1].name, "[2] code");
        assert_eq!((cells[1].start_line, cells[1].end_line), (8, Some(14)));
        assert_eq!(cells[1].metadata.extra["execution_count"], 3);
        assert_eq!(cells[1].metadata.extra["outputs"], 1);

        assert_eq!(structure.facts["kernel"], "Python 3");
        assert_eq!(structure.facts["language"], "python");
        assert_eq!(structure.facts["cell_counts"]["code"], 1);
    }

    #[test]
    fn test_extract_cell_source() {
        let extractor = extract(NOTEBOOK);
        let element = extractor.extract_element("cell", "[2] code").unwrap();
        assert!(element.source_text.contains("import pandas as pd"));
        assert_eq!(element.start_line, 8);
    }

    #[test]
    fn test_invalid_notebook_is_malformed() {
        let extractor = extract("{\"cells\": [\n");
        let structure = extractor.structure();
        assert!(structure.is_malformed());
        assert!(structure.is_empty());
    }
}
