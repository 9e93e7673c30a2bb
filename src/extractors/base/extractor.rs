// BaseExtractor and the Extractor trait
//
// Every format-specific extractor owns a BaseExtractor: the decoded source,
// the extractor id and the StructureMap computed once at construction.

use std::sync::Arc;
use tracing::debug;

use super::types::{category_matches, ExtractedElement, StructuralElement, StructureMap};
use crate::source::{FileMetadata, Source};

/// Constructor for an extractor bound to one decoded file
pub type ExtractorFactory = Arc<dyn Fn(Arc<Source>) -> Box<dyn Extractor> + Send + Sync>;

/// A format-specific view over one file
///
/// Extractors are constructed per file and never shared between threads
/// mid-analysis; `Send + Sync` lets a finished one cross a worker boundary.
pub trait Extractor: Send + Sync {
    fn base(&self) -> &BaseExtractor;

    /// Registry id ("python", "nginx", ...)
    fn id(&self) -> &str {
        &self.base().id
    }

    fn source(&self) -> &Source {
        &self.base().source
    }

    /// Categorized element listing; elements in source order
    fn structure(&self) -> StructureMap {
        self.base().structure.clone()
    }

    /// Exact source text of one named element.
    ///
    /// An empty category searches every category. Duplicate names resolve to
    /// the first occurrence in source order.
    fn extract_element(&self, category: &str, name: &str) -> Option<ExtractedElement> {
        let base = self.base();
        base.find_element(category, |e| e.name == name)
            .map(|(category, element)| base.element_text(category, element))
    }

    fn metadata(&self) -> FileMetadata {
        self.base().source.metadata()
    }
}

/// Shared state and helpers for extractors
pub struct BaseExtractor {
    pub id: String,
    pub source: Arc<Source>,
    pub structure: StructureMap,
}

impl BaseExtractor {
    pub fn new(id: impl Into<String>, source: Arc<Source>) -> Self {
        Self {
            id: id.into(),
            source,
            structure: StructureMap::new(),
        }
    }

    /// Add an element, clamping its lines into the file
    pub fn push(&mut self, category: &str, mut element: StructuralElement) {
        let last = (self.source.line_count() as u32).max(1);
        element.start_line = element.start_line.clamp(1, last);
        if let Some(end) = element.end_line {
            element.end_line = Some(end.clamp(element.start_line, last));
        }
        self.structure.push(category, element);
    }

    /// First element (source order) of a matching category satisfying `pred`
    pub fn find_element<F>(&self, category: &str, pred: F) -> Option<(&str, &StructuralElement)>
    where
        F: Fn(&StructuralElement) -> bool,
    {
        let mut best: Option<(&str, &StructuralElement)> = None;
        for entry in self.structure.iter() {
            if !category_matches(&entry.name, category) {
                continue;
            }
            if let Some(found) = entry.elements.iter().find(|e| pred(e)) {
                let earlier = best.map_or(true, |(_, b)| found.start_line < b.start_line);
                if earlier {
                    best = Some((entry.name.as_str(), found));
                }
            }
        }
        best
    }

    /// Names of every element in matching categories (for "not found" hints)
    pub fn available_names(&self, category: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .structure
            .iter()
            .filter(|entry| category_matches(&entry.name, category))
            .flat_map(|entry| entry.elements.iter().map(|e| e.name.clone()))
            .collect();
        names.dedup();
        names
    }

    /// Source text covering an element's full line range
    pub fn element_text(&self, category: &str, element: &StructuralElement) -> ExtractedElement {
        let end_line = element.last_line();
        debug!(
            "Extracting {} '{}' lines {}-{} from {}",
            category,
            element.name,
            element.start_line,
            end_line,
            self.source.path().display()
        );
        ExtractedElement {
            name: element.name.clone(),
            category: category.to_string(),
            kind: element.kind,
            source_text: self.source.line_range_text(element.start_line, end_line),
            start_line: element.start_line,
            end_line,
        }
    }

    /// Finish construction: source order per category
    pub fn finish(mut self) -> Self {
        self.structure.sort_by_line();
        self
    }
}

/// Truncate to at most `max_chars` characters, appending "..." when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
