/// Plain-text fallback - no structure, metadata only
use std::sync::Arc;

use crate::extractors::base::{BaseExtractor, Extractor, ExtractorFactory};
use crate::source::Source;

pub struct TextExtractor {
    base: BaseExtractor,
}

impl TextExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("text", source);
        let non_blank = base
            .source
            .lines()
            .iter()
            .filter(|line| !line.trim().is_empty())
            .count();
        base.structure.set_fact("non_blank_lines", non_blank);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(TextExtractor::new(source)))
    }
}

impl Extractor for TextExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }
}
