//! Reveal's Extractors Module
//!
//! Every extractor turns one file into a `StructureMap` and serves element
//! extraction through the shared `Extractor` trait.
//!
//! # Architecture
//!
//! - `base` - Extractor trait, BaseExtractor and the structural types
//! - `registry` - AnalyzerRegistry: file -> extractor resolution
//! - `manager` - Reveal: the analysis pipeline and batch runner
//! - `syntax_tree` - one generic tree-sitter extractor driven by per-grammar tables
//! - Format modules (markdown, yaml, nginx, ...) - hand-written convention parsers
//! - `json`, `toml`, `jupyter` - tree-sitter backed config formats

pub mod base;
pub mod manager;
pub mod registry;
pub mod syntax_tree;

// Syntax-tree backed config formats
pub mod json;
pub mod jupyter;
pub mod toml;

// Convention-based formats
pub mod dockerfile;
pub mod ini;
pub mod jsonl;
pub mod markdown;
pub mod nginx;
pub mod sql;
pub mod text;
pub mod yaml;

// Re-export the public API
pub use base::{
    category_matches, CategoryEntry, ElementKind, ElementMetadata, ExtractedElement, Extractor,
    ExtractorFactory, StructuralElement, StructureMap,
};
pub use registry::{
    builtin_extractor, AnalyzerRegistry, ExtractorFamily, ExtractorInfo, MatchPattern, Resolved,
    Tier,
};
