/// JSON Lines extractor - one record per non-empty line
///
/// Records are named `<type> #<n>` where `type` is the record's `"type"`
/// field (or `record`) and `n` counts non-empty lines from 1. Lines that do
/// not parse are kept as `invalid #<n>` records carrying the parse error.
/// Per-type counts are recorded as the `record_types` fact.
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::extractors::base::{
    truncate_chars, BaseExtractor, ElementKind, ExtractedElement, Extractor, ExtractorFactory,
    StructuralElement,
};
use crate::source::Source;

const PREVIEW_CHARS: usize = 80;

pub struct JsonlExtractor {
    base: BaseExtractor,
}

impl JsonlExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("jsonl", source);
        extract_records(&mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(JsonlExtractor::new(source)))
    }
}

impl Extractor for JsonlExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }

    /// Accepts a record number (`"3"`), a full name (`"user #3"`) or a
    /// record type (`"user"`, first record of that type)
    fn extract_element(&self, category: &str, name: &str) -> Option<ExtractedElement> {
        let base = self.base();
        let found = match name.trim_start_matches('#').parse::<u64>() {
            Ok(n) => base.find_element(category, |e| {
                e.metadata.extra.get("record").and_then(Value::as_u64) == Some(n)
            }),
            Err(_) => base
                .find_element(category, |e| e.name == name)
                .or_else(|| base.find_element(category, |e| e.extra_str("type") == Some(name))),
        };
        found.map(|(category, element)| base.element_text(category, element))
    }
}

fn extract_records(base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut record = 0u64;
    let mut invalid = 0u64;

    for (idx, line) in source.lines().iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        record += 1;
        let line_no = idx as u32 + 1;

        let element = match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                let record_type = value
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("record")
                    .to_string();
                *counts.entry(record_type.clone()).or_default() += 1;
                StructuralElement::new(
                    ElementKind::Record,
                    format!("{} #{}", record_type, record),
                    line_no,
                )
                .with_extra("type", record_type)
                .with_extra("fields", value.as_object().map_or(0, |o| o.len()))
            }
            Err(e) => {
                invalid += 1;
                StructuralElement::new(ElementKind::Record, format!("invalid #{}", record), line_no)
                    .with_extra("type", "invalid")
                    .with_extra("error", e.to_string())
            }
        };
        let element = element
            .with_end_line(line_no)
            .with_extra("record", record)
            .with_extra("preview", truncate_chars(trimmed, PREVIEW_CHARS));
        base.push("records", element);
    }

    base.structure.set_fact("total_records", record);
    base.structure.set_fact("invalid_records", invalid);
    let types = serde_json::to_value(&counts).unwrap_or(Value::Null);
    base.structure.set_fact("record_types", types);
    if invalid > 0 {
        let reason = format!("{} of {} lines are not valid JSON", invalid, record);
        base.structure.mark_malformed(reason);
    }
}
