//! AnalyzerRegistry - maps a file to the extractor responsible for it
//!
//! Resolution tiers, strongest first:
//! 1. exact file name (`Dockerfile`)
//! 2. path convention scoped to an extension (`/nginx/*.conf`)
//! 3. extension (`.py`)
//! 4. path convention (`/nginx/`)
//! 5. shebang interpreter, sniffed only for extensionless files nothing above matched
//! 6. bundled grammar for an unregistered extension (`.pyi`)
//! 7. generic fallback (`*`)
//!
//! Within a tier the first registration wins. The registry is built once
//! (`discover`) and shared read-only afterwards.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::base::{Extractor, ExtractorFactory};
use super::dockerfile::DockerfileExtractor;
use super::ini::IniExtractor;
use super::json::JsonExtractor;
use super::jsonl::JsonlExtractor;
use super::jupyter::JupyterExtractor;
use super::markdown::MarkdownExtractor;
use super::nginx::NginxExtractor;
use super::sql::SqlExtractor;
use super::syntax_tree::grammars::{builtin_grammar, custom_grammar};
use super::syntax_tree::SyntaxTreeExtractor;
use super::text::TextExtractor;
use super::toml::TomlExtractor;
use super::yaml::YamlExtractor;
use crate::config::{AnalyzerModule, RevealConfig};
use crate::errors::{Result, RevealError};
use crate::language::grammar_for_extension;
use crate::source::Source;
use crate::utils::paths::{extension_lower, file_name_lower, to_unix_style};

const SHEBANG_SNIFF_BYTES: u64 = 256;

/// How a registration matches a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPattern {
    /// Case-insensitive final component
    FileName(String),
    /// Lowercased, without the dot
    Extension(String),
    /// Fragment of the absolute Unix-style path, optionally limited to one extension
    PathConvention {
        fragment: String,
        extension: Option<String>,
    },
    /// Interpreter prefix ("python" matches python3)
    Shebang(String),
    Fallback,
}

impl FromStr for MatchPattern {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("empty match pattern");
        }
        if s == "*" {
            return Ok(MatchPattern::Fallback);
        }
        if let Some(interpreter) = s.strip_prefix("#!") {
            let interpreter = interpreter.trim().to_lowercase();
            if interpreter.is_empty() {
                anyhow::bail!("shebang pattern '{}' names no interpreter", s);
            }
            return Ok(MatchPattern::Shebang(interpreter));
        }
        if s.contains('/') {
            if let Some((fragment, ext)) = s.rsplit_once("*.") {
                if ext.is_empty() || ext.contains('/') {
                    anyhow::bail!("invalid scoped path pattern '{}'", s);
                }
                return Ok(MatchPattern::PathConvention {
                    fragment: fragment.to_string(),
                    extension: Some(ext.to_lowercase()),
                });
            }
            return Ok(MatchPattern::PathConvention {
                fragment: s.to_string(),
                extension: None,
            });
        }
        if let Some(ext) = s.strip_prefix('.') {
            if ext.is_empty() || ext.contains('*') {
                anyhow::bail!("invalid extension pattern '{}'", s);
            }
            return Ok(MatchPattern::Extension(ext.to_lowercase()));
        }
        if s.contains('*') {
            anyhow::bail!("unsupported wildcard pattern '{}'", s);
        }
        Ok(MatchPattern::FileName(s.to_lowercase()))
    }
}

/// Resolution tier; declaration order is precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    FileName,
    ScopedConvention,
    Extension,
    PathConvention,
    Shebang,
    GrammarFallback,
    Fallback,
}

/// Facts about one path, computed once per resolution
struct PathFacts {
    name: Option<String>,
    extension: Option<String>,
    unix_path: String,
}

impl MatchPattern {
    fn tier_for(&self, facts: &PathFacts) -> Option<Tier> {
        match self {
            MatchPattern::FileName(name) => {
                (facts.name.as_deref() == Some(name.as_str())).then_some(Tier::FileName)
            }
            MatchPattern::Extension(ext) => {
                (facts.extension.as_deref() == Some(ext.as_str())).then_some(Tier::Extension)
            }
            MatchPattern::PathConvention {
                fragment,
                extension,
            } => {
                if !facts.unix_path.contains(fragment.as_str()) {
                    return None;
                }
                match extension {
                    Some(ext) => (facts.extension.as_deref() == Some(ext.as_str()))
                        .then_some(Tier::ScopedConvention),
                    None => Some(Tier::PathConvention),
                }
            }
            MatchPattern::Shebang(_) | MatchPattern::Fallback => None,
        }
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPattern::FileName(name) => write!(f, "{}", name),
            MatchPattern::Extension(ext) => write!(f, ".{}", ext),
            MatchPattern::PathConvention {
                fragment,
                extension: Some(ext),
            } => write!(f, "{}*.{}", fragment, ext),
            MatchPattern::PathConvention { fragment, .. } => write!(f, "{}", fragment),
            MatchPattern::Shebang(interpreter) => write!(f, "#!{}", interpreter),
            MatchPattern::Fallback => write!(f, "*"),
        }
    }
}

/// Extractor family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorFamily {
    SyntaxTree,
    Convention,
    Fallback,
}

/// Registration metadata shown to renderers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorInfo {
    pub id: String,
    pub display_name: String,
    pub family: ExtractorFamily,
}

impl ExtractorInfo {
    pub fn new(id: &str, display_name: &str, family: ExtractorFamily) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            family,
        }
    }
}

#[derive(Clone)]
pub struct Registration {
    pub pattern: MatchPattern,
    pub info: Arc<ExtractorInfo>,
    factory: ExtractorFactory,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("pattern", &self.pattern)
            .field("info", &self.info)
            .finish()
    }
}

/// Outcome of a successful `resolve`
#[derive(Clone)]
pub struct Resolved {
    pub info: Arc<ExtractorInfo>,
    pub tier: Tier,
    factory: ExtractorFactory,
}

impl Resolved {
    pub fn instantiate(&self, source: Arc<Source>) -> Box<dyn Extractor> {
        (self.factory)(source)
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("info", &self.info)
            .field("tier", &self.tier)
            .finish()
    }
}

/// Ordered registrations plus the fallback switch
#[derive(Debug, Clone)]
pub struct AnalyzerRegistry {
    registrations: Vec<Registration>,
    allow_fallback: bool,
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerRegistry {
    /// Empty registry (fallback allowed)
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            allow_fallback: true,
        }
    }

    /// Built-in extractors only
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// User extension modules first (so they can override), then built-ins
    pub fn discover(config: &RevealConfig) -> Self {
        let mut registry = Self::new();
        registry.allow_fallback = config.allow_fallback;

        let mut skipped = 0;
        for module in &config.analyzers {
            if let Err(e) = registry.register_module(module) {
                skipped += 1;
                warn!(
                    analyzer = %module.name,
                    "⚠️  Skipping analyzer module: {:#}", e
                );
            }
        }
        registry.register_builtins();

        info!(
            "Analyzer registry ready: {} registrations ({} user modules skipped)",
            registry.registrations.len(),
            skipped
        );
        registry
    }

    /// Replace this snapshot with a freshly discovered one
    pub fn rediscover(&mut self, config: &RevealConfig) {
        *self = Self::discover(config);
    }

    pub fn register(&mut self, pattern: MatchPattern, info: Arc<ExtractorInfo>, factory: ExtractorFactory) {
        debug!("Registering {} for '{}'", info.id, pattern);
        self.registrations.push(Registration {
            pattern,
            info,
            factory,
        });
    }

    /// Register one extractor under several string patterns; all must parse
    pub fn register_patterns(
        &mut self,
        patterns: &[&str],
        info: ExtractorInfo,
        factory: ExtractorFactory,
    ) -> anyhow::Result<()> {
        let parsed = patterns
            .iter()
            .map(|p| p.parse::<MatchPattern>())
            .collect::<anyhow::Result<Vec<_>>>()?;
        let info = Arc::new(info);
        for pattern in parsed {
            self.register(pattern, Arc::clone(&info), Arc::clone(&factory));
        }
        Ok(())
    }

    /// All registrations in registration order
    pub fn list(&self) -> &[Registration] {
        &self.registrations
    }

    /// Resolve a path, reading its first line from disk if shebang sniffing is needed
    pub fn resolve(&self, path: &Path) -> Result<Resolved> {
        self.resolve_with(path, || read_first_line(path))
    }

    /// Resolve an already-read source
    pub fn resolve_source(&self, source: &Source) -> Result<Resolved> {
        self.resolve_with(source.path(), || Some(source.first_line_bytes().to_vec()))
    }

    fn resolve_with<F>(&self, path: &Path, first_line: F) -> Result<Resolved>
    where
        F: FnOnce() -> Option<Vec<u8>>,
    {
        let facts = PathFacts {
            name: file_name_lower(path),
            extension: extension_lower(path),
            unix_path: to_unix_style(path),
        };

        let mut best: Option<(Tier, &Registration)> = None;
        for registration in &self.registrations {
            if let Some(tier) = registration.pattern.tier_for(&facts) {
                if best.map_or(true, |(current, _)| tier < current) {
                    best = Some((tier, registration));
                }
            }
        }

        if best.is_none() && facts.extension.is_none() {
            if let Some(interpreter) = first_line().and_then(|line| shebang_interpreter(&line)) {
                best = self
                    .registrations
                    .iter()
                    .find(|r| matches!(&r.pattern, MatchPattern::Shebang(p) if interpreter.starts_with(p.as_str())))
                    .map(|r| (Tier::Shebang, r));
            }
        }

        if best.is_none() && self.allow_fallback {
            best = facts
                .extension
                .as_deref()
                .and_then(grammar_for_extension)
                .and_then(|grammar| {
                    self.registrations.iter().find(|r| {
                        r.info.id == grammar && r.info.family == ExtractorFamily::SyntaxTree
                    })
                })
                .map(|r| (Tier::GrammarFallback, r))
                .or_else(|| {
                    self.registrations
                        .iter()
                        .find(|r| r.pattern == MatchPattern::Fallback)
                        .map(|r| (Tier::Fallback, r))
                });
        }

        match best {
            Some((tier, registration)) => {
                debug!(
                    "Resolved {} to {} ({:?})",
                    path.display(),
                    registration.info.id,
                    tier
                );
                Ok(Resolved {
                    info: Arc::clone(&registration.info),
                    tier,
                    factory: Arc::clone(&registration.factory),
                })
            }
            None => Err(RevealError::UnsupportedFile {
                path: path.to_path_buf(),
            }),
        }
    }

    fn register_module(&mut self, module: &AnalyzerModule) -> anyhow::Result<()> {
        if module.name.trim().is_empty() {
            anyhow::bail!("analyzer module has no name");
        }
        if module.patterns.is_empty() {
            anyhow::bail!("analyzer '{}' has no patterns", module.name);
        }
        let display_name = module.display_name.as_deref().unwrap_or(&module.name);
        let patterns: Vec<&str> = module.patterns.iter().map(String::as_str).collect();

        match (&module.extractor, &module.grammar) {
            (Some(extractor), _) => {
                let (info, factory) = builtin_extractor(extractor)
                    .ok_or_else(|| anyhow::anyhow!("unknown extractor '{}'", extractor))?;
                let info = ExtractorInfo::new(&module.name, display_name, info.family);
                self.register_patterns(&patterns, info, factory)
            }
            (None, Some(grammar)) => {
                let spec = custom_grammar(&module.name, grammar, &module.categories)?;
                let info = ExtractorInfo::new(&module.name, display_name, ExtractorFamily::SyntaxTree);
                self.register_patterns(&patterns, info, SyntaxTreeExtractor::factory(spec))
            }
            (None, None) => anyhow::bail!(
                "analyzer '{}' needs either `extractor` or `grammar`",
                module.name
            ),
        }
    }

    fn register_builtins(&mut self) {
        for (id, patterns) in BUILTIN_PATTERNS {
            let Some((info, factory)) = builtin_extractor(id) else {
                warn!("⚠️  No built-in extractor named {}", id);
                continue;
            };
            if let Err(e) = self.register_patterns(patterns, info, factory) {
                warn!(extractor = %id, "⚠️  Skipping built-in registration: {:#}", e);
            }
        }
    }
}

/// Built-in extractor ids with their match patterns, in registration order
const BUILTIN_PATTERNS: &[(&str, &[&str])] = &[
    ("python", &[".py", "#!python"]),
    ("rust", &[".rs"]),
    ("go", &[".go"]),
    ("javascript", &[".js", ".jsx", ".mjs", ".cjs", "#!node"]),
    ("typescript", &[".ts", ".mts", ".cts"]),
    ("tsx", &[".tsx"]),
    ("java", &[".java"]),
    ("c", &[".c", ".h"]),
    ("cpp", &[".cpp", ".cc", ".cxx", ".hpp", ".hh"]),
    ("csharp", &[".cs"]),
    ("php", &[".php", "#!php"]),
    ("ruby", &[".rb", "Gemfile", "Rakefile", "#!ruby"]),
    ("swift", &[".swift"]),
    ("kotlin", &[".kt", ".kts"]),
    ("lua", &[".lua", "#!lua"]),
    ("zig", &[".zig"]),
    ("gdscript", &[".gd"]),
    ("bash", &[".sh", ".bash", ".zsh", "#!bash", "#!sh", "#!zsh", "#!dash"]),
    ("json", &[".json", ".jsonc"]),
    ("toml", &[".toml"]),
    ("markdown", &[".md", ".markdown"]),
    ("yaml", &[".yml", ".yaml"]),
    ("jsonl", &[".jsonl", ".ndjson"]),
    ("nginx", &["nginx.conf", "/nginx/*.conf", "/nginx/"]),
    ("ini", &[".ini", ".cfg", ".conf"]),
    ("dockerfile", &["Dockerfile", "Containerfile", ".dockerfile"]),
    ("sql", &[".sql", ".ddl", ".dml"]),
    ("jupyter", &[".ipynb"]),
    ("text", &["*"]),
];

/// Metadata and factory of a built-in extractor
pub fn builtin_extractor(id: &str) -> Option<(ExtractorInfo, ExtractorFactory)> {
    use ExtractorFamily::*;

    let entry = match id {
        "json" => (ExtractorInfo::new("json", "JSON", SyntaxTree), JsonExtractor::factory()),
        "toml" => (ExtractorInfo::new("toml", "TOML", SyntaxTree), TomlExtractor::factory()),
        "markdown" => (
            ExtractorInfo::new("markdown", "Markdown", Convention),
            MarkdownExtractor::factory(),
        ),
        "yaml" => (ExtractorInfo::new("yaml", "YAML", Convention), YamlExtractor::factory()),
        "jsonl" => (
            ExtractorInfo::new("jsonl", "JSON Lines", Convention),
            JsonlExtractor::factory(),
        ),
        "nginx" => (
            ExtractorInfo::new("nginx", "Nginx", Convention),
            NginxExtractor::factory(),
        ),
        "ini" => (ExtractorInfo::new("ini", "INI", Convention), IniExtractor::factory()),
        "dockerfile" => (
            ExtractorInfo::new("dockerfile", "Dockerfile", Convention),
            DockerfileExtractor::factory(),
        ),
        "sql" => (ExtractorInfo::new("sql", "SQL", Convention), SqlExtractor::factory()),
        "jupyter" => (
            ExtractorInfo::new("jupyter", "Jupyter Notebook", Convention),
            JupyterExtractor::factory(),
        ),
        "text" => (ExtractorInfo::new("text", "Text", Fallback), TextExtractor::factory()),
        grammar => {
            let spec = builtin_grammar(grammar)?;
            (
                ExtractorInfo::new(grammar, display_name(grammar), SyntaxTree),
                SyntaxTreeExtractor::factory(spec),
            )
        }
    };
    Some(entry)
}

fn display_name(grammar: &str) -> &'static str {
    match grammar {
        "python" => "Python",
        "rust" => "Rust",
        "go" => "Go",
        "javascript" => "JavaScript",
        "typescript" => "TypeScript",
        "tsx" => "TSX",
        "java" => "Java",
        "c" => "C",
        "cpp" => "C++",
        "csharp" => "C#",
        "php" => "PHP",
        "ruby" => "Ruby",
        "swift" => "Swift",
        "kotlin" => "Kotlin",
        "lua" => "Lua",
        "zig" => "Zig",
        "gdscript" => "GDScript",
        "bash" => "Shell",
        _ => "Source",
    }
}

fn read_first_line(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let mut line = Vec::new();
    BufReader::new(file.take(SHEBANG_SNIFF_BYTES))
        .read_until(b'\n', &mut line)
        .ok()?;
    Some(line)
}

/// Lowercased interpreter named by a `#!` line (`/usr/bin/env` is looked through)
fn shebang_interpreter(first_line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(first_line);
    let command = line.trim().strip_prefix("#!")?;
    let mut tokens = command.split_whitespace();
    let program = tokens.next()?;
    let mut name = program.rsplit('/').next()?.to_lowercase();
    if name == "env" {
        let target = tokens.find(|t| !t.starts_with('-') && !t.contains('='))?;
        name = target.rsplit('/').next()?.to_lowercase();
    }
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn resolved_id(registry: &AnalyzerRegistry, path: &str) -> Option<String> {
        registry
            .resolve(Path::new(path))
            .ok()
            .map(|r| r.info.id.clone())
    }

    #[test]
    fn test_pattern_parsing() {
        assert_eq!(
            "Dockerfile".parse::<MatchPattern>().unwrap(),
            MatchPattern::FileName("dockerfile".to_string())
        );
        assert_eq!(
            ".PY".parse::<MatchPattern>().unwrap(),
            MatchPattern::Extension("py".to_string())
        );
        assert_eq!(
            "/nginx/*.conf".parse::<MatchPattern>().unwrap(),
            MatchPattern::PathConvention {
                fragment: "/nginx/".to_string(),
                extension: Some("conf".to_string())
            }
        );
        assert_eq!(
            "#!python".parse::<MatchPattern>().unwrap(),
            MatchPattern::Shebang("python".to_string())
        );
        assert_eq!("*".parse::<MatchPattern>().unwrap(), MatchPattern::Fallback);
        assert!("".parse::<MatchPattern>().is_err());
        assert!("#!".parse::<MatchPattern>().is_err());
        assert!("*.py".parse::<MatchPattern>().is_err());
    }

    #[test]
    fn test_exact_file_name_beats_fallback() {
        let registry = AnalyzerRegistry::builtin();
        let resolved = registry.resolve(Path::new("/src/app/Dockerfile")).unwrap();
        assert_eq!(resolved.info.id, "dockerfile");
        assert_eq!(resolved.tier, Tier::FileName);
    }

    #[test]
    fn test_nginx_convention_beats_generic_conf() {
        let registry = AnalyzerRegistry::builtin();
        assert_eq!(
            resolved_id(&registry, "/etc/nginx/sites-enabled/site.conf").as_deref(),
            Some("nginx")
        );
        assert_eq!(
            resolved_id(&registry, "/etc/nginx/sites-available/default").as_deref(),
            Some("nginx")
        );
        assert_eq!(resolved_id(&registry, "/etc/app/app.conf").as_deref(), Some("ini"));
    }

    #[test]
    fn test_extension_and_grammar_fallback() {
        let registry = AnalyzerRegistry::builtin();
        let resolved = registry.resolve(Path::new("lib/models.py")).unwrap();
        assert_eq!(resolved.info.id, "python");
        assert_eq!(resolved.tier, Tier::Extension);

        let stub = registry.resolve(Path::new("lib/models.pyi")).unwrap();
        assert_eq!(stub.info.id, "python");
        assert_eq!(stub.tier, Tier::GrammarFallback);

        let other = registry.resolve(Path::new("notes.unknownext")).unwrap();
        assert_eq!(other.info.id, "text");
        assert_eq!(other.tier, Tier::Fallback);
    }

    #[test]
    fn test_shebang_sniffing_for_extensionless_scripts() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("deploy");
        fs::write(&script, "#!/usr/bin/env python3\nprint('hi')\n").unwrap();
        let tool = temp.path().join("backup");
        fs::write(&tool, "#!/bin/bash\necho hi\n").unwrap();

        let registry = AnalyzerRegistry::builtin();
        let resolved = registry.resolve(&script).unwrap();
        assert_eq!(resolved.info.id, "python");
        assert_eq!(resolved.tier, Tier::Shebang);
        assert_eq!(resolved_id(&registry, tool.to_str().unwrap()).as_deref(), Some("bash"));
    }

    #[test]
    fn test_shebang_ignored_for_unregistered_extension() {
        let temp = TempDir::new().unwrap();
        let notes = temp.path().join("notes.unknownext");
        fs::write(&notes, "#!/bin/bash\necho hi\n").unwrap();

        let registry = AnalyzerRegistry::builtin();
        let resolved = registry.resolve(&notes).unwrap();
        assert_eq!(resolved.info.id, "text");
        assert_eq!(resolved.tier, Tier::Fallback);

        let source = Source::from_text(&notes, "#!/bin/bash\necho hi\n");
        assert_eq!(registry.resolve_source(&source).unwrap().info.id, "text");
    }

    #[test]
    fn test_unsupported_without_fallback() {
        let config = RevealConfig {
            allow_fallback: false,
            ..RevealConfig::default()
        };
        let registry = AnalyzerRegistry::discover(&config);
        let err = registry.resolve(Path::new("/tmp/blob.bin")).unwrap_err();
        assert!(matches!(err, RevealError::UnsupportedFile { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_first_registration_wins_within_tier() {
        let mut registry = AnalyzerRegistry::new();
        let (_, yaml) = builtin_extractor("yaml").unwrap();
        let (_, ini) = builtin_extractor("ini").unwrap();
        registry
            .register_patterns(&[".cfg"], ExtractorInfo::new("first", "First", ExtractorFamily::Convention), yaml)
            .unwrap();
        registry
            .register_patterns(&[".cfg"], ExtractorInfo::new("second", "Second", ExtractorFamily::Convention), ini)
            .unwrap();
        assert_eq!(resolved_id(&registry, "setup.cfg").as_deref(), Some("first"));
    }

    #[test]
    fn test_user_modules_override_and_broken_ones_are_skipped() {
        let config = RevealConfig {
            analyzers: vec![
                AnalyzerModule {
                    name: "workflows".to_string(),
                    patterns: vec!["/.github/workflows/".to_string(), ".yml".to_string()],
                    extractor: Some("yaml".to_string()),
                    ..AnalyzerModule::default()
                },
                AnalyzerModule {
                    name: "broken".to_string(),
                    patterns: vec![".brk".to_string()],
                    extractor: Some("no-such-extractor".to_string()),
                    ..AnalyzerModule::default()
                },
                AnalyzerModule {
                    name: "starlark".to_string(),
                    patterns: vec![".star".to_string()],
                    grammar: Some("python".to_string()),
                    categories: [("functions".to_string(), vec!["function_definition".to_string()])]
                        .into_iter()
                        .collect(),
                    ..AnalyzerModule::default()
                },
            ],
            ..RevealConfig::default()
        };
        let registry = AnalyzerRegistry::discover(&config);

        assert_eq!(resolved_id(&registry, "ci.yml").as_deref(), Some("workflows"));
        assert_eq!(resolved_id(&registry, "x.brk").as_deref(), Some("text"));

        let resolved = registry.resolve(Path::new("BUILD.star")).unwrap();
        assert_eq!(resolved.info.id, "starlark");
        let source = Arc::new(Source::from_text("BUILD.star", "def rule(ctx):\n    pass\n"));
        let extractor = resolved.instantiate(source);
        let structure = extractor.structure();
        assert_eq!(structure.get("functions")[0].name, "rule");
    }

    #[test]
    fn test_rediscover_rebuilds_snapshot() {
        let mut registry = AnalyzerRegistry::builtin();
        let before = registry.list().len();
        let config = RevealConfig {
            analyzers: vec![AnalyzerModule {
                name: "proto".to_string(),
                patterns: vec![".proto".to_string()],
                extractor: Some("text".to_string()),
                ..AnalyzerModule::default()
            }],
            ..RevealConfig::default()
        };
        registry.rediscover(&config);
        assert_eq!(registry.list().len(), before + 1);
        assert_eq!(registry.list()[0].info.id, "proto");
    }

    #[test]
    fn test_shebang_interpreter_parsing() {
        assert_eq!(shebang_interpreter(b"#!/usr/bin/env -S python3 -u").as_deref(), Some("python3"));
        assert_eq!(shebang_interpreter(b"#!/bin/sh\n").as_deref(), Some("sh"));
        assert_eq!(shebang_interpreter(b"echo hi"), None);
    }
}
