// Reveal's Utilities Module
//
// Common helpers shared by the registry, the rule engine and the pipeline.

/// Path conversion utilities (absolute Unix-style, lowercased names)
pub mod paths;
