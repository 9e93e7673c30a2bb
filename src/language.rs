//! Language Support - Shared tree-sitter grammar configuration
//!
//! ALL grammar lookup goes through here so the registry, the syntax-tree
//! extractors and the built-in detectors agree on grammar names.

use anyhow::Result;

/// Grammar names `get_tree_sitter_language` accepts
pub const SUPPORTED_GRAMMARS: &[&str] = &[
    "rust",
    "c",
    "cpp",
    "go",
    "zig",
    "typescript",
    "tsx",
    "javascript",
    "python",
    "java",
    "csharp",
    "php",
    "ruby",
    "swift",
    "kotlin",
    "lua",
    "bash",
    "gdscript",
    "json",
    "toml",
];

/// Get tree-sitter language parser for a given grammar name
pub fn get_tree_sitter_language(grammar: &str) -> Result<tree_sitter::Language> {
    match grammar {
        // Systems languages
        "rust" => Ok(tree_sitter_rust::LANGUAGE.into()),
        "c" => Ok(tree_sitter_c::LANGUAGE.into()),
        "cpp" => Ok(tree_sitter_cpp::LANGUAGE.into()),
        "go" => Ok(tree_sitter_go::LANGUAGE.into()),
        "zig" => Ok(tree_sitter_zig::LANGUAGE.into()),

        // Web languages
        "typescript" => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "javascript" | "jsx" => Ok(tree_sitter_javascript::LANGUAGE.into()),

        // Backend languages
        "python" => Ok(tree_sitter_python::LANGUAGE.into()),
        "java" => Ok(tree_sitter_java::LANGUAGE.into()),
        "csharp" => Ok(tree_sitter_c_sharp::LANGUAGE.into()),
        "php" => Ok(tree_sitter_php::LANGUAGE_PHP.into()),
        "ruby" => Ok(tree_sitter_ruby::LANGUAGE.into()),
        "swift" => Ok(tree_sitter_swift::LANGUAGE.into()),
        "kotlin" => Ok(tree_sitter_kotlin_ng::LANGUAGE.into()),

        // Scripting languages
        "lua" => Ok(tree_sitter_lua::LANGUAGE.into()),
        "bash" => Ok(tree_sitter_bash::LANGUAGE.into()),
        "gdscript" => Ok(tree_sitter_gdscript::LANGUAGE.into()),

        // Configuration languages
        "json" => Ok(tree_sitter_json::LANGUAGE.into()),
        "toml" => Ok(tree_sitter_toml_ng::LANGUAGE.into()),

        _ => Err(anyhow::anyhow!(
            "Unsupported grammar: '{}'. Supported grammars: {}",
            grammar,
            SUPPORTED_GRAMMARS.join(", ")
        )),
    }
}

/// Grammar for a file extension (without the dot, lowercase)
///
/// Backs the registry's last-resort syntax-tree fallback for extensions no
/// extractor claims explicitly.
pub fn grammar_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "rs" => Some("rust"),
        "ts" | "mts" | "cts" => Some("typescript"),
        "tsx" => Some("tsx"),
        "js" | "jsx" | "mjs" | "cjs" => Some("javascript"),
        "py" | "pyi" | "pyw" => Some("python"),
        "go" => Some("go"),
        "java" => Some("java"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some("cpp"),
        "cs" => Some("csharp"),
        "rb" | "rake" | "gemspec" => Some("ruby"),
        "php" => Some("php"),
        "swift" => Some("swift"),
        "kt" | "kts" => Some("kotlin"),
        "gd" => Some("gdscript"),
        "lua" => Some("lua"),
        "sh" | "bash" | "zsh" => Some("bash"),
        "zig" => Some("zig"),
        "json" | "jsonc" => Some("json"),
        "toml" => Some("toml"),
        _ => None,
    }
}
