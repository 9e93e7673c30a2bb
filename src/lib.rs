// Reveal Core - structural extraction, outline, slicing and rules for source and config files
//
// Architecture: one pipeline (`Reveal`) over immutable snapshots.
// - extractors: registry (file -> extractor) plus one extractor per format
// - outline / slicer: views over a StructureMap
// - rules: detectors run in isolation over structure and raw content
//
// The crate never renders output and never parses command lines; callers
// hand in an `AnalysisRequest` and receive plain data.

pub mod config;
pub mod errors;
pub mod extractors;
pub mod language;
pub mod outline;
pub mod rules;
pub mod slicer;
pub mod source;
pub mod utils;

#[cfg(test)]
mod tests;

pub use config::{AnalysisRequest, AnalyzerModule, ElementQuery, RevealConfig, RulesConfig};
pub use errors::{Result, RevealError};
pub use extractors::manager::{Analysis, Reveal};
pub use extractors::{
    AnalyzerRegistry, ElementKind, ExtractedElement, Extractor, StructuralElement, StructureMap,
};
pub use outline::{build_outline, OutlineNode};
pub use rules::{
    DetectionReport, Detector, DetectorDescriptor, Finding, RuleCategory, RuleEngine, RuleFilter,
    Severity,
};
pub use slicer::{slice, SliceMode, SliceRequest, SliceSummary};
pub use source::{Encoding, FileMetadata, ReadLimits, Source};
