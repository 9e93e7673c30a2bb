/// INI / generic `.conf` extractor - `[section]` headers and `key = value` pairs
///
/// A section runs to the line before the next header. Keys before the first
/// header are top-level; keys inside a section carry the section name.
/// `;` and `#` start comments.
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::extractors::base::{
    BaseExtractor, ElementKind, Extractor, ExtractorFactory, StructuralElement,
};
use crate::source::Source;

static SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[([^\[\]]+)\]\s*(?:[;#].*)?$").expect("valid section regex"));
static KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([^=:\s;#\[][^=:]*?)\s*[=:]").expect("valid key regex"));

pub struct IniExtractor {
    base: BaseExtractor,
}

impl IniExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("ini", source);
        extract_sections(&mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(IniExtractor::new(source)))
    }
}

impl Extractor for IniExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }
}

fn extract_sections(base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);
    let mut sections: Vec<StructuralElement> = Vec::new();
    let mut keys: Vec<StructuralElement> = Vec::new();
    let mut last_content: u32 = 0;

    for (idx, line) in source.lines().iter().enumerate() {
        let line_no = idx as u32 + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }

        if let Some(caps) = SECTION.captures(line) {
            if let Some(open) = sections.last_mut() {
                open.end_line = Some(last_content.max(open.start_line));
            }
            sections.push(
                StructuralElement::new(ElementKind::Section, caps[1].trim(), line_no)
                    .with_depth(0)
                    .with_extra("keys", 0),
            );
        } else if let Some(caps) = KEY.captures(line) {
            let mut key = StructuralElement::new(ElementKind::Key, caps[1].trim(), line_no)
                .with_end_line(line_no);
            match sections.last_mut() {
                Some(section) => {
                    let count = section
                        .metadata
                        .extra
                        .get("keys")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0);
                    section.metadata.extra.insert("keys".into(), (count + 1).into());
                    key = key
                        .with_depth(1)
                        .with_extra("section", section.name.clone());
                }
                None => key = key.with_depth(0),
            }
            keys.push(key);
        }
        last_content = line_no;
    }
    if let Some(open) = sections.last_mut() {
        open.end_line = Some(last_content.max(open.start_line));
    }

    for section in sections {
        base.push("sections", section);
    }
    for key in keys {
        base.push("keys", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_and_keys() {
        let text = "; global settings\nroot = /srv\n\n[database]\nhost = localhost\nport: 5432\n\n[cache] ; in-memory\nenabled = true\n\n";
        let extractor = IniExtractor::new(Arc::new(Source::from_text("app.ini", text)));
        let structure = extractor.structure();

        let sections = structure.get("sections");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "database");
        assert_eq!((sections[0].start_line, sections[0].end_line), (4, Some(6)));
        assert_eq!(sections[0].metadata.extra["keys"], 2);
        assert_eq!((sections[1].start_line, sections[1].end_line), (8, Some(9)));

        let keys = structure.get("keys");
        let names: Vec<&str> = keys.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["root", "host", "port", "enabled"]);
        assert_eq!(keys[0].metadata.depth, Some(0));
        assert_eq!(keys[2].extra_str("section"), Some("database"));
    }
}
