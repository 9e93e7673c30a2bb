/// Dockerfile extractor - build stages and instructions
///
/// Every `FROM` opens a stage that runs to the line before the next `FROM`;
/// the stage is named by its `AS` alias, or by its image. Instructions span
/// their `\` continuation lines.
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::extractors::base::{
    truncate_chars, BaseExtractor, ElementKind, Extractor, ExtractorFactory, StructuralElement,
};
use crate::source::Source;

const ARGS_PREVIEW_CHARS: usize = 80;

static INSTRUCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(FROM|RUN|CMD|LABEL|MAINTAINER|EXPOSE|ENV|ADD|COPY|ENTRYPOINT|VOLUME|USER|WORKDIR|ARG|ONBUILD|STOPSIGNAL|HEALTHCHECK|SHELL)\b\s*(.*)$",
    )
    .expect("valid instruction regex")
});
static FROM_ARGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:--platform=\S+\s+)?(\S+)(?:\s+AS\s+(\S+))?").expect("valid FROM regex")
});

pub struct DockerfileExtractor {
    base: BaseExtractor,
}

impl DockerfileExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("dockerfile", source);
        extract_stages(&mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(DockerfileExtractor::new(source)))
    }
}

impl Extractor for DockerfileExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }
}

fn extract_stages(base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);
    let lines = source.lines();
    let mut stages: Vec<StructuralElement> = Vec::new();
    let mut instructions: Vec<StructuralElement> = Vec::new();
    let mut last_content: u32 = 0;

    let mut idx = 0;
    while idx < lines.len() {
        let line_no = idx as u32 + 1;
        let trimmed = lines[idx].trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            idx += 1;
            continue;
        }

        // Join continuation lines
        let mut text = trimmed.trim_end_matches('\\').trim().to_string();
        let mut end = idx;
        while lines[end].trim_end().ends_with('\\') && end + 1 < lines.len() {
            end += 1;
            let next = lines[end].trim();
            if !next.starts_with('#') {
                text.push(' ');
                text.push_str(next.trim_end_matches('\\').trim());
            }
        }
        let end_line = end as u32 + 1;

        if let Some(caps) = INSTRUCTION.captures(&text) {
            let keyword = caps[1].to_ascii_uppercase();
            let args = caps[2].trim().to_string();

            if keyword == "FROM" {
                if let Some(open) = stages.last_mut() {
                    open.end_line = Some(last_content.max(open.start_line));
                }
                if let Some(from) = FROM_ARGS.captures(&args) {
                    let image = from[1].to_string();
                    let alias = from.get(2).map(|m| m.as_str().to_string());
                    let name = alias.clone().unwrap_or_else(|| image.clone());
                    let mut stage = StructuralElement::new(ElementKind::Stage, name, line_no)
                        .with_depth(0)
                        .with_extra("image", image)
                        .with_extra("index", stages.len());
                    if let Some(alias) = alias {
                        stage = stage.with_extra("alias", alias);
                    }
                    stages.push(stage);
                }
            }

            let depth = if stages.is_empty() { 0 } else { 1 };
            instructions.push(
                StructuralElement::new(ElementKind::Instruction, keyword, line_no)
                    .with_end_line(end_line)
                    .with_depth(depth)
                    .with_extra("args", truncate_chars(&args, ARGS_PREVIEW_CHARS)),
            );
        }

        last_content = end_line;
        idx = end + 1;
    }
    if let Some(open) = stages.last_mut() {
        open.end_line = Some(last_content.max(open.start_line));
    }

    for stage in stages {
        base.push("stages", stage);
    }
    for instruction in instructions {
        base.push("instructions", instruction);
    }
}
