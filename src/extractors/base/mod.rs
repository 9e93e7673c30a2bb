// Base extractor types and traits
//
// - types.rs: StructuralElement, StructureMap, ExtractedElement
// - extractor.rs: the Extractor trait and BaseExtractor
// - tree_methods.rs: tree-sitter parsing and navigation helpers

pub mod extractor;
pub mod tree_methods;
pub mod types;

// Re-export key types for external use
pub use extractor::{truncate_chars, BaseExtractor, Extractor, ExtractorFactory};
pub use types::{
    category_matches, CategoryEntry, ElementKind, ElementMetadata, ExtractedElement,
    StructuralElement, StructureMap,
};
