/// SQL extractor - CREATE statements as tables, views, indexes, routines and triggers
///
/// The script is split into statements by a small state machine: a `;`
/// ends a statement only outside quotes, comments, dollar-quoted bodies and
/// parentheses. MySQL `DELIMITER` lines switch the terminator.
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::extractors::base::{
    BaseExtractor, ElementKind, Extractor, ExtractorFactory, StructuralElement,
};
use crate::source::Source;

static CREATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:(?:GLOBAL|LOCAL|TEMP|TEMPORARY|UNIQUE|MATERIALIZED|UNLOGGED|RECURSIVE|DEFINER\s*=\s*\S+)\s+)*(TABLE|VIEW|INDEX|FUNCTION|PROCEDURE|TRIGGER)\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:CONCURRENTLY\s+)?([\w."`\[\]$]+)"#,
    )
    .expect("valid CREATE regex")
});
static UNIQUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?UNIQUE\s").expect("valid regex"));
static ON_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\sON\s+([\w."`\[\]]+)"#).expect("valid ON regex"));

const CONSTRAINT_PREFIXES: &[&str] = &[
    "PRIMARY", "FOREIGN", "UNIQUE", "CONSTRAINT", "CHECK", "KEY", "INDEX", "EXCLUDE",
];

pub struct SqlExtractor {
    base: BaseExtractor,
}

impl SqlExtractor {
    pub fn new(source: Arc<Source>) -> Self {
        let mut base = BaseExtractor::new("sql", source);
        extract_statements(&mut base);
        Self {
            base: base.finish(),
        }
    }

    pub fn factory() -> ExtractorFactory {
        Arc::new(|source| Box::new(SqlExtractor::new(source)))
    }
}

impl Extractor for SqlExtractor {
    fn base(&self) -> &BaseExtractor {
        &self.base
    }
}

/// One statement with comments removed
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub text: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    Normal,
    Quoted(char),
    LineComment,
    BlockComment,
    Dollar(String),
}

/// Split a script into statements; the flag reports an unterminated
/// quote, comment or dollar-quoted body at end of input
pub(crate) fn split_statements(text: &str) -> (Vec<Statement>, bool) {
    let chars: Vec<char> = text.chars().collect();
    let mut statements = Vec::new();
    let mut state = State::Normal;
    let mut current = String::new();
    let mut start_line: Option<u32> = None;
    let mut line: u32 = 1;
    let mut depth: u32 = 0;
    let mut delimiter = ";".to_string();
    let mut at_line_start = true;

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();

        if at_line_start && state == State::Normal && current.trim().is_empty() {
            let rest: String = chars[i..].iter().take_while(|c| **c != '\n').collect();
            let trimmed = rest.trim();
            let keyword = trimmed.get(..10).unwrap_or("");
            if trimmed.len() > 10 && keyword.eq_ignore_ascii_case("DELIMITER ") {
                delimiter = trimmed[10..].trim().to_string();
                i += rest.chars().count();
                continue;
            }
        }
        at_line_start = ch == '\n';

        match &state {
            State::LineComment => {
                if ch == '\n' {
                    state = State::Normal;
                    current.push('\n');
                }
            }
            State::BlockComment => {
                if ch == '*' && next == Some('/') {
                    state = State::Normal;
                    current.push(' ');
                    i += 1;
                } else if ch == '\n' {
                    current.push('\n');
                }
            }
            State::Quoted(q) => {
                current.push(ch);
                if ch == *q {
                    // doubled quote is an escaped quote
                    if next == Some(*q) {
                        current.push(*q);
                        i += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Dollar(tag) => {
                let closing: Vec<char> = tag.chars().collect();
                if chars[i..].starts_with(&closing) {
                    current.push_str(tag);
                    i += closing.len();
                    state = State::Normal;
                    continue;
                }
                current.push(ch);
            }
            State::Normal => {
                if ch == '-' && next == Some('-') {
                    state = State::LineComment;
                    i += 2;
                    continue;
                }
                if ch == '/' && next == Some('*') {
                    state = State::BlockComment;
                    i += 2;
                    continue;
                }
                if !ch.is_whitespace() && start_line.is_none() {
                    start_line = Some(line);
                }
                match ch {
                    '\'' | '"' | '`' => {
                        state = State::Quoted(ch);
                        current.push(ch);
                    }
                    '$' => match dollar_tag(&chars[i..]) {
                        Some(tag) => {
                            i += tag.chars().count();
                            current.push_str(&tag);
                            state = State::Dollar(tag);
                            continue;
                        }
                        None => current.push(ch),
                    },
                    '(' => {
                        depth += 1;
                        current.push(ch);
                    }
                    ')' => {
                        depth = depth.saturating_sub(1);
                        current.push(ch);
                    }
                    _ => current.push(ch),
                }

                let terminated = if delimiter == ";" {
                    ch == ';' && depth == 0
                } else {
                    current.ends_with(delimiter.as_str())
                };
                if terminated {
                    let body = current.trim_end().trim_end_matches(delimiter.as_str());
                    if let Some(start) = start_line {
                        statements.push(Statement {
                            text: body.trim().to_string(),
                            start_line: start,
                            end_line: line,
                        });
                    }
                    current.clear();
                    start_line = None;
                    depth = 0;
                }
            }
        }

        if ch == '\n' {
            line += 1;
        }
        i += 1;
    }

    if let Some(start) = start_line {
        let body = current.trim();
        if !body.is_empty() {
            let end = start + body.matches('\n').count() as u32;
            statements.push(Statement {
                text: body.to_string(),
                start_line: start,
                end_line: end,
            });
        }
    }
    let unterminated = matches!(
        state,
        State::Quoted(_) | State::BlockComment | State::Dollar(_)
    );
    (statements, unterminated)
}

/// `$$` or `$tag$` at the start of `chars`
fn dollar_tag(chars: &[char]) -> Option<String> {
    let mut tag = String::from("$");
    for ch in chars.iter().skip(1) {
        if *ch == '$' {
            tag.push('$');
            return Some(tag);
        }
        if ch.is_alphanumeric() || *ch == '_' {
            tag.push(*ch);
        } else {
            return None;
        }
    }
    None
}

fn extract_statements(base: &mut BaseExtractor) {
    let source = Arc::clone(&base.source);
    let (statements, unterminated) = split_statements(source.text());
    base.structure.set_fact("dialect", detect_dialect(source.text()));
    base.structure.set_fact("statements", statements.len());
    if unterminated {
        base.structure
            .mark_malformed("unterminated quote, comment or dollar-quoted body");
    }

    for statement in &statements {
        let Some(caps) = CREATE.captures(&statement.text) else {
            continue;
        };
        let object = caps[1].to_ascii_uppercase();
        let name = clean_identifier(&caps[2]);
        let (kind, category) = match object.as_str() {
            "TABLE" => (ElementKind::Table, "tables"),
            "VIEW" => (ElementKind::View, "views"),
            "INDEX" => (ElementKind::Index, "indexes"),
            "FUNCTION" => (ElementKind::Routine, "functions"),
            "PROCEDURE" => (ElementKind::Routine, "procedures"),
            _ => (ElementKind::Trigger, "triggers"),
        };

        let mut element = StructuralElement::new(kind, name, statement.start_line)
            .with_end_line(statement.end_line)
            .with_depth(0);
        match kind {
            ElementKind::Table => {
                if let Some(columns) = column_count(&statement.text) {
                    element = element.with_extra("columns", columns);
                }
            }
            ElementKind::Index | ElementKind::Trigger => {
                if let Some(on) = ON_TABLE.captures(&statement.text) {
                    element = element.with_extra("table", clean_identifier(&on[1]));
                }
                if kind == ElementKind::Index {
                    element = element.with_extra("unique", UNIQUE.is_match(&statement.text));
                }
            }
            _ => {}
        }
        base.push(category, element);
    }
}

fn clean_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect()
}

/// Column definitions inside the first parenthesized list, constraints excluded
fn column_count(statement: &str) -> Option<usize> {
    let open = statement.find('(')?;
    let mut depth = 0;
    let mut parts: Vec<String> = vec![String::new()];
    for ch in statement[open..].chars() {
        match ch {
            '(' => {
                depth += 1;
                if depth == 1 {
                    continue;
                }
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            ',' if depth == 1 => {
                parts.push(String::new());
                continue;
            }
            _ => {}
        }
        if let Some(part) = parts.last_mut() {
            part.push(ch);
        }
    }
    let count = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .filter(|p| {
            let first = p.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
            !CONSTRAINT_PREFIXES.contains(&first.as_str())
        })
        .count();
    Some(count)
}

fn detect_dialect(text: &str) -> &'static str {
    let upper = text.to_ascii_uppercase();
    if ["TIMESTAMPTZ", "SERIAL", "$$", "JSONB"]
        .iter()
        .any(|kw| upper.contains(kw))
    {
        "postgres"
    } else if ["DELIMITER", "AUTO_INCREMENT", "TINYINT"]
        .iter()
        .any(|kw| upper.contains(kw))
    {
        "mysql"
    } else if upper.contains("AUTOINCREMENT") {
        "sqlite"
    } else {
        "generic"
    }
}
