/// Nginx configuration extractor - server, location and upstream blocks
///
/// Blocks are matched with a brace stack, so a block's end line is its own
/// closing brace however deep it nests. Directives inside a block become
/// metadata of the innermost relevant block:
/// - `server_name` names the server, `listen` sets its port
/// - `proxy_pass` / `root` set a location's target
/// - `server` lines count an upstream's backends
use std::sync::Arc;

use crate::extractors::base::{
    BaseExtractor, ElementKind, ExtractedElement, Extractor, ExtractorFactory, StructuralElement,
};
use crate::source::Source;

const MAX_BLOCK_DEPTH: usize = 64;
const HEADER_COMMENT_LINES: u32 = 10;
const UNNAMED: &str = "unknown";

pub struct NginxExtractor {
    base: BaseExtractor,
}

impl NginxExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("nginx", source);
        extract_blocks(&mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(NginxExtractor::new(source)))
    }
}

impl Extractor for NginxExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }

    /// A server matches any one of its `server_name` values
    fn extract_element(&self, category: &str, name: &str) -> Option<ExtractedElement> {
        let base = self.base();
        base.find_element(category, |e| e.name == name)
            .or_else(|| {
                base.find_element(category, |e| {
                    e.kind == ElementKind::Server && e.name.split_whitespace().any(|n| n == name)
                })
            })
            .map(|(category, element)| base.element_text(category, element))
    }
}

struct OpenBlock {
    directive: String,
    /// Index into the collected elements for blocks that become elements
    index: Option<usize>,
}

struct BlockScanner {
    elements: Vec<(&'static str, StructuralElement)>,
    open: Vec<OpenBlock>,
    /// Blocks nested past MAX_BLOCK_DEPTH, counted but not tracked
    overflow: usize,
    statement: String,
    statement_line: u32,
    problems: Vec<String>,
}

impl BlockScanner {
    fn new() -> Self {
        Self {
            elements: Vec::new(),
            open: Vec::new(),
            overflow: 0,
            statement: String::new(),
            statement_line: 0,
            problems: Vec::new(),
        }
    }

    fn feed(&mut self, line: &str, line_no: u32) {
        let mut quote: Option<char> = None;
        for ch in line.chars() {
            if let Some(q) = quote {
                self.push_char(ch, line_no);
                if ch == q {
                    quote = None;
                }
                continue;
            }
            match ch {
                '#' => break,
                '"' | '\'' => {
                    quote = Some(ch);
                    self.push_char(ch, line_no);
                }
                ';' => self.end_statement(),
                '{' => self.open_block(line_no),
                '}' => self.close_block(line_no),
                _ => self.push_char(ch, line_no),
            }
        }
        self.statement.push(' ');
    }

    fn push_char(&mut self, ch: char, line_no: u32) {
        if self.statement.trim().is_empty() && !ch.is_whitespace() {
            self.statement_line = line_no;
        }
        self.statement.push(ch);
    }

    fn take_tokens(&mut self) -> Vec<String> {
        let tokens = self
            .statement
            .split_whitespace()
            .map(|t| t.trim_matches('"').trim_matches('\'').to_string())
            .collect();
        self.statement.clear();
        tokens
    }

    fn end_statement(&mut self) {
        let tokens = self.take_tokens();
        let Some((directive, args)) = tokens.split_first() else {
            return;
        };
        match directive.as_str() {
            "server_name" => {
                if let Some(server) = self.innermost(ElementKind::Server) {
                    if server.name == UNNAMED && !args.is_empty() {
                        server.name = args.join(" ");
                    }
                }
            }
            "listen" => {
                if let (Some(server), Some(port)) = (self.innermost(ElementKind::Server), args.first())
                {
                    if !server.metadata.extra.contains_key("port") {
                        let ssl = port.starts_with("443") || args.iter().any(|a| a == "ssl");
                        let port = if ssl {
                            format!("{} (SSL)", port)
                        } else {
                            port.clone()
                        };
                        server.metadata.extra.insert("port".into(), port.into());
                    }
                }
            }
            "proxy_pass" | "root" | "alias" | "return" => {
                if let (Some(location), Some(arg)) =
                    (self.innermost(ElementKind::Location), args.first())
                {
                    if !location.metadata.extra.contains_key("target") {
                        let target = match directive.as_str() {
                            "proxy_pass" => arg.clone(),
                            "return" => format!("return: {}", args.join(" ")),
                            _ => format!("static: {}", arg),
                        };
                        location.metadata.extra.insert("target".into(), target.into());
                    }
                }
            }
            "server" => {
                if let Some(upstream) = self.innermost(ElementKind::Upstream) {
                    let backends = upstream
                        .metadata
                        .extra
                        .get("backends")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0);
                    upstream
                        .metadata
                        .extra
                        .insert("backends".into(), (backends + 1).into());
                }
            }
            _ => {}
        }
    }

    fn open_block(&mut self, line_no: u32) {
        let start = if self.statement.trim().is_empty() {
            line_no
        } else {
            self.statement_line
        };
        let tokens = self.take_tokens();
        if self.open.len() >= MAX_BLOCK_DEPTH {
            self.overflow += 1;
            return;
        }

        let directive = tokens.first().cloned().unwrap_or_default();
        let args = tokens.get(1..).map(|a| a.join(" ")).unwrap_or_default();
        let depth = self.open.len() as u32;
        let element = match directive.as_str() {
            "server" => Some((
                "servers",
                StructuralElement::new(ElementKind::Server, UNNAMED, start),
            )),
            "location" if !args.is_empty() => Some((
                "locations",
                StructuralElement::new(ElementKind::Location, &args, start)
                    .with_extra("path", args.clone()),
            )),
            "upstream" if !args.is_empty() => Some((
                "upstreams",
                StructuralElement::new(ElementKind::Upstream, &args, start),
            )),
            _ => None,
        };

        let index = element.map(|(category, element)| {
            self.elements.push((category, element.with_depth(depth)));
            self.elements.len() - 1
        });
        self.open.push(OpenBlock { directive, index });
    }

    fn close_block(&mut self, line_no: u32) {
        // A final directive without ';' before '}'
        if !self.statement.trim().is_empty() {
            self.end_statement();
        }
        if self.overflow > 0 {
            self.overflow -= 1;
            return;
        }
        let Some(block) = self.open.pop() else {
            self.problems
                .push(format!("unbalanced '}}' at line {}", line_no));
            return;
        };
        if let Some(index) = block.index {
            self.finish_element(index, line_no);
        }
    }

    fn finish_element(&mut self, index: usize, end: u32) {
        let server_name = self
            .open
            .iter()
            .rev()
            .filter_map(|b| b.index)
            .map(|i| &self.elements[i].1)
            .find(|e| e.kind == ElementKind::Server)
            .map(|e| e.name.clone());

        let element = &mut self.elements[index].1;
        element.end_line = Some(end.max(element.start_line));
        if element.kind == ElementKind::Location {
            element.metadata.extra.insert(
                "server".into(),
                server_name.unwrap_or_else(|| UNNAMED.to_string()).into(),
            );
        }
    }

    /// Innermost open block of a kind
    fn innermost(&mut self, kind: ElementKind) -> Option<&mut StructuralElement> {
        let index = self
            .open
            .iter()
            .rev()
            .filter_map(|b| b.index)
            .find(|i| self.elements[*i].1.kind == kind)?;
        Some(&mut self.elements[index].1)
    }

    fn finish(mut self, last_line: u32) -> (Vec<(&'static str, StructuralElement)>, Vec<String>) {
        if !self.open.is_empty() {
            let names: Vec<String> = self.open.iter().map(|b| b.directive.clone()).collect();
            self.problems
                .push(format!("unclosed block(s) at end of file: {}", names.join(", ")));
            while let Some(block) = self.open.pop() {
                if let Some(index) = block.index {
                    self.finish_element(index, last_line);
                }
            }
        }
        (self.elements, self.problems)
    }
}

fn extract_blocks(base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);
    let mut scanner = BlockScanner::new();

    for category in ["comments", "servers", "locations", "upstreams"] {
        base.structure.ensure_category(category);
    }

    for (idx, line) in source.lines().iter().enumerate() {
        let line_no = idx as u32 + 1;
        let trimmed = line.trim();
        if line_no <= HEADER_COMMENT_LINES && trimmed.starts_with('#') && trimmed.len() > 3 {
            let text = trimmed.trim_start_matches('#').trim();
            base.push(
                "comments",
                StructuralElement::new(ElementKind::Comment, text, line_no),
            );
        }
        scanner.feed(line, line_no);
    }

    let (elements, problems) = scanner.finish(source.line_count() as u32);
    for (category, element) in elements {
        base.push(category, element);
    }
    if let Some(first) = problems.first() {
        base.structure.mark_malformed(first.clone());
    }
    base.structure.remove_empty();
}
