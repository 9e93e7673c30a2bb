/// Markdown extractor - headings as sections, fenced code blocks, links
///
/// A section runs from its heading to the line before the next heading of
/// the same or higher level, so nested headings nest in the outline.
/// Headings inside fenced code are ignored.
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::extractors::base::{
    BaseExtractor, ElementKind, ExtractedElement, Extractor, ExtractorFactory, StructuralElement,
};
use crate::source::Source;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").expect("valid heading regex"));
static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(`{3,}|~{3,})\s*([\w+#.-]*)").expect("valid fence regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)[^)]*\)").expect("valid link regex"));

pub struct MarkdownExtractor {
    base: BaseExtractor,
}

impl MarkdownExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("markdown", source);
        extract_sections(&mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(MarkdownExtractor::new(source)))
    }
}

impl Extractor for MarkdownExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }

    /// Heading lookups ignore case
    fn extract_element(&self, category: &str, name: &str) -> Option<ExtractedElement> {
        let base = self.base();
        base.find_element(category, |e| e.name == name)
            .or_else(|| base.find_element(category, |e| e.name.eq_ignore_ascii_case(name)))
            .map(|(category, element)| base.element_text(category, element))
    }
}

struct OpenHeading {
    level: usize,
    index: usize,
}

struct OpenFence {
    marker: String,
    language: String,
    start: u32,
}

fn extract_sections(base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);
    let line_count = source.line_count() as u32;

    let mut sections: Vec<StructuralElement> = Vec::new();
    let mut open: Vec<OpenHeading> = Vec::new();
    let mut fence: Option<OpenFence> = None;
    for category in ["sections", "code_blocks", "links"] {
        base.structure.ensure_category(category);
    }

    for (idx, line) in source.lines().iter().enumerate() {
        let line_no = idx as u32 + 1;

        if let Some(caps) = FENCE.captures(line) {
            let marker = caps[1].to_string();
            match fence.take() {
                None => {
                    fence = Some(OpenFence {
                        marker,
                        language: caps[2].to_string(),
                        start: line_no,
                    });
                }
                Some(current)
                    if marker.starts_with(&current.marker[..1])
                        && marker.len() >= current.marker.len() =>
                {
                    push_code_block(base, &current, line_no);
                }
                Some(current) => fence = Some(current),
            }
            continue;
        }
        if fence.is_some() {
            continue;
        }

        if let Some(caps) = HEADING.captures(line) {
            let level = caps[1].len();
            while open.last().is_some_and(|h| h.level >= level) {
                if let Some(closed) = open.pop() {
                    close_section(&mut sections[closed.index], line_no - 1);
                }
            }
            let section = StructuralElement::new(ElementKind::Section, &caps[2], line_no)
                .with_depth(open.len() as u32)
                .with_extra("level", level);
            open.push(OpenHeading {
                level,
                index: sections.len(),
            });
            sections.push(section);
            continue;
        }

        for caps in LINK.captures_iter(line) {
            let url = caps[2].to_string();
            let link = StructuralElement::new(ElementKind::Link, &caps[1], line_no)
                .with_extra("link_type", link_type(&url))
                .with_extra("url", url);
            base.push("links", link);
        }
    }

    // An unterminated fence runs to the end of the file
    if let Some(current) = fence {
        push_code_block(base, &current, line_count.max(current.start));
        let reason = format!("unclosed code fence at line {}", current.start);
        base.structure.mark_malformed(reason);
    }
    for heading in open {
        close_section(&mut sections[heading.index], line_count);
    }

    for section in sections {
        base.push("sections", section);
    }
    base.structure.remove_empty();
}

/// End a section at `last_line` (never before its heading)
fn close_section(section: &mut StructuralElement, last_line: u32) {
    section.end_line = Some(last_line.max(section.start_line));
}

fn push_code_block(base: &mut BaseExtractor, fence: &OpenFence, end: u32) {
    let name = if fence.language.is_empty() {
        "text".to_string()
    } else {
        fence.language.clone()
    };
    let block = StructuralElement::new(ElementKind::CodeBlock, name, fence.start)
        .with_end_line(end)
        .with_extra("line_count", end.saturating_sub(fence.start + 1));
    base.push("code_blocks", block);
}

fn link_type(url: &str) -> &'static str {
    if url.starts_with("http://") || url.starts_with("https://") {
        "external"
    } else if url.starts_with("mailto:") {
        "email"
    } else {
        "internal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Guide

Intro text with a [link](https://example.com).

## Install

```bash
# not a heading
pip install reveal
```

### From source

Build it.

## Usage

See [usage](docs/usage.md).

# Appendix
";

    fn extract(text: &str) -> MarkdownExtractor {
        MarkdownExtractor::new(Arc::new(Source::from_text("README.md", text)))
    }

    #[test]
    fn test_sections_end_at_next_heading_of_same_or_higher_level() {
        let extractor = extract(DOC);
        let structure = extractor.structure();
        let sections = structure.get("sections");
        let spans: Vec<(&str, u32, Option<u32>)> = sections
            .iter()
            .map(|s| (s.name.as_str(), s.start_line, s.end_line))
            .collect();
        assert_eq!(
            spans,
            vec![
                ("Guide", 1, Some(19)),
                ("Install", 5, Some(15)),
                ("From source", 12, Some(15)),
                ("Usage", 16, Some(19)),
                ("Appendix", 20, Some(20)),
            ]
        );
        assert_eq!(sections[2].metadata.extra["level"], 3);
        assert_eq!(sections[2].metadata.depth, Some(2));
    }

    #[test]
    fn test_code_blocks_and_links() {
        let extractor = extract(DOC);
        let structure = extractor.structure();

        let blocks = structure.get("code_blocks");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, "bash");
        assert_eq!((blocks[0].start_line, blocks[0].end_line), (7, Some(10)));

        let links = structure.get("links");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].extra_str("link_type"), Some("external"));
        assert_eq!(links[1].extra_str("url"), Some("docs/usage.md"));
    }

    #[test]
    fn test_heading_lookup_ignores_case() {
        let extractor = extract(DOC);
        let element = extractor.extract_element("section", "from SOURCE").unwrap();
        assert_eq!(element.source_text, "### From source\n\nBuild it.\n");
    }

    #[test]
    fn test_unclosed_fence_is_malformed_not_fatal() {
        let extractor = extract("# Title\n```rust\nfn main() {}\n");
        let structure = extractor.structure();
        assert!(structure.is_malformed());
        assert_eq!(structure.get("code_blocks")[0].end_line, Some(3));
    }
}
