//! Built-in detectors
//!
//! Each detector owns its descriptor; `builtin_detectors` is the table the
//! rule engine registers first, before any declarative root.

mod bare_except;
mod complexity;
mod docker_latest;
mod function_length;
mod insecure_url;
mod line_length;
mod nesting_depth;
mod too_many_params;

use std::sync::Arc;

use super::Detector;
use crate::extractors::base::{StructuralElement, StructureMap};

pub use bare_except::BareExcept;
pub use complexity::Complexity;
pub use docker_latest::DockerLatest;
pub use function_length::FunctionLength;
pub use insecure_url::InsecureGithubUrl;
pub use line_length::LineLength;
pub use nesting_depth::NestingDepth;
pub use too_many_params::TooManyParams;

/// Every built-in detector, in registration order
pub fn builtin_detectors() -> Vec<Arc<dyn Detector>> {
    vec![
        Arc::new(BareExcept::new()),
        Arc::new(Complexity::new()),
        Arc::new(FunctionLength::new()),
        Arc::new(NestingDepth::new()),
        Arc::new(LineLength::new()),
        Arc::new(TooManyParams::new()),
        Arc::new(DockerLatest::new()),
        Arc::new(InsecureGithubUrl::new()),
    ]
}

/// Callable elements with a known end line
fn callables(structure: &StructureMap) -> impl Iterator<Item = &StructuralElement> {
    structure
        .all_elements()
        .map(|(_, element)| element)
        .filter(|element| element.kind.is_callable())
}

/// Lines `start..=end` (1-based) of `content`
fn element_lines<'a>(
    content: &'a str,
    element: &StructuralElement,
) -> impl Iterator<Item = (u32, &'a str)> {
    let start = element.start_line;
    let end = element.last_line();
    content
        .lines()
        .enumerate()
        .skip(start as usize - 1)
        .take((end - start + 1) as usize)
        .map(|(index, line)| (index as u32 + 1, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_are_unique_and_categorized() {
        let detectors = builtin_detectors();
        let ids: HashSet<String> = detectors.iter().map(|d| d.descriptor().id.clone()).collect();
        assert_eq!(ids.len(), detectors.len());
        for detector in &detectors {
            let descriptor = detector.descriptor();
            assert_eq!(
                super::super::RuleCategory::from_rule_id(&descriptor.id),
                Some(descriptor.category),
                "{}",
                descriptor.id
            );
        }
    }
}
