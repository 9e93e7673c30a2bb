//! Semantic slicing: head / tail / range over whole structural units
//!
//! Positions are 1-based and inclusive. Bounds past the end clamp to the
//! available units; an empty selection is a normal result, not an error.
//! Structures are sliced per category.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, RevealError};
use crate::extractors::base::StructureMap;

/// Exactly one selection per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceMode {
    Head(usize),
    Tail(usize),
    /// 1-based, inclusive
    Range(usize, usize),
}

impl SliceMode {
    /// Zero-based half-open bounds for `len` units, clamped
    pub fn bounds(&self, len: usize) -> (usize, usize) {
        match *self {
            SliceMode::Head(n) => (0, n.min(len)),
            SliceMode::Tail(n) => (len.saturating_sub(n), len),
            SliceMode::Range(start, end) => {
                let first = start.saturating_sub(1).min(len);
                let last = end.min(len).max(first);
                (first, last)
            }
        }
    }
}

/// Raw head/tail/range options as received from the CLI layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceRequest {
    pub head: Option<usize>,
    pub tail: Option<usize>,
    pub range: Option<(usize, usize)>,
}

impl SliceRequest {
    pub fn head(n: usize) -> Self {
        Self {
            head: Some(n),
            ..Self::default()
        }
    }

    pub fn tail(n: usize) -> Self {
        Self {
            tail: Some(n),
            ..Self::default()
        }
    }

    pub fn range(start: usize, end: usize) -> Self {
        Self {
            range: Some((start, end)),
            ..Self::default()
        }
    }

    /// The single requested mode, `None` when nothing was requested
    pub fn validate(&self) -> Result<Option<SliceMode>> {
        let requested = [self.head.is_some(), self.tail.is_some(), self.range.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if requested > 1 {
            return Err(RevealError::invalid_slice(
                "head, tail and range are mutually exclusive",
            ));
        }
        if let Some((start, end)) = self.range {
            if start == 0 {
                return Err(RevealError::invalid_slice("range start is 1-based"));
            }
            if start > end {
                return Err(RevealError::invalid_slice(format!(
                    "range start {} is after end {}",
                    start, end
                )));
            }
        }
        Ok(self
            .head
            .map(SliceMode::Head)
            .or(self.tail.map(SliceMode::Tail))
            .or(self.range.map(|(s, e)| SliceMode::Range(s, e))))
    }
}

/// What a slice kept and what it left out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SliceSummary {
    pub mode: SliceMode,
    pub total: usize,
    pub selected: usize,
    /// 1-based position of the first selected unit
    pub first: Option<usize>,
    pub omitted_before: usize,
    pub omitted_after: usize,
}

impl SliceSummary {
    pub fn is_partial(&self) -> bool {
        self.selected < self.total
    }
}

/// Selected units plus the summary record
#[derive(Debug, Clone, PartialEq)]
pub struct Slice<T> {
    pub units: Vec<T>,
    pub summary: SliceSummary,
}

pub fn slice<T: Clone>(units: &[T], mode: SliceMode) -> Slice<T> {
    let (first, last) = mode.bounds(units.len());
    let selected = units[first..last].to_vec();
    Slice {
        summary: SliceSummary {
            mode,
            total: units.len(),
            selected: selected.len(),
            first: (!selected.is_empty()).then_some(first + 1),
            omitted_before: first,
            omitted_after: units.len() - last,
        },
        units: selected,
    }
}

/// Slice every category independently; categories keep their order
pub fn slice_structure(
    structure: &StructureMap,
    mode: SliceMode,
) -> (StructureMap, Vec<(String, SliceSummary)>) {
    let mut sliced = StructureMap::new();
    sliced.facts = structure.facts.clone();
    sliced.malformed = structure.malformed.clone();

    let mut summaries = Vec::new();
    for entry in structure.iter() {
        let result = slice(&entry.elements, mode);
        let target = sliced.ensure_category(&entry.name);
        target.extend(result.units);
        summaries.push((entry.name.clone(), result.summary));
    }
    (sliced, summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::base::{ElementKind, StructuralElement};

    fn items() -> Vec<u32> {
        (1..=10).collect()
    }

    #[test]
    fn test_head_tail_range() {
        assert_eq!(slice(&items(), SliceMode::Head(3)).units, vec![1, 2, 3]);
        assert_eq!(slice(&items(), SliceMode::Tail(3)).units, vec![8, 9, 10]);
        assert_eq!(slice(&items(), SliceMode::Range(3, 5)).units, vec![3, 4, 5]);
        assert_eq!(slice(&items(), SliceMode::Range(5, 5)).units, vec![5]);
    }

    #[test]
    fn test_out_of_bounds_clamps() {
        assert_eq!(slice(&items(), SliceMode::Head(20)).units, items());
        assert_eq!(slice(&items(), SliceMode::Tail(20)).units, items());
        assert_eq!(slice(&items(), SliceMode::Range(8, 50)).units, vec![8, 9, 10]);

        let beyond = slice(&items(), SliceMode::Range(40, 50));
        assert!(beyond.units.is_empty());
        assert_eq!(beyond.summary.first, None);
        assert_eq!(beyond.summary.omitted_before, 10);

        let empty: Vec<u32> = Vec::new();
        assert!(slice(&empty, SliceMode::Head(5)).units.is_empty());
        assert!(slice(&items(), SliceMode::Head(0)).units.is_empty());
    }

    #[test]
    fn test_full_range_is_identity() {
        let units = items();
        let result = slice(&units, SliceMode::Range(1, units.len()));
        assert_eq!(result.units, units);
        assert!(!result.summary.is_partial());
    }

    #[test]
    fn test_summary_counts() {
        let result = slice(&items(), SliceMode::Range(4, 6));
        assert_eq!(
            result.summary,
            SliceSummary {
                mode: SliceMode::Range(4, 6),
                total: 10,
                selected: 3,
                first: Some(4),
                omitted_before: 3,
                omitted_after: 4,
            }
        );
    }

    #[test]
    fn test_request_validation() {
        assert_eq!(SliceRequest::default().validate().unwrap(), None);
        assert_eq!(
            SliceRequest::head(5).validate().unwrap(),
            Some(SliceMode::Head(5))
        );
        assert_eq!(
            SliceRequest::range(2, 4).validate().unwrap(),
            Some(SliceMode::Range(2, 4))
        );

        let both = SliceRequest {
            head: Some(5),
            tail: Some(5),
            range: None,
        };
        assert!(matches!(both.validate(), Err(RevealError::InvalidSlice(_))));
        assert!(SliceRequest::range(0, 3).validate().is_err());
        assert!(SliceRequest::range(5, 3).validate().is_err());
    }

    #[test]
    fn test_structure_is_sliced_per_category() {
        let mut structure = StructureMap::new();
        for i in 1..=6 {
            structure.push(
                "functions",
                StructuralElement::new(ElementKind::Function, format!("f{}", i), i * 10),
            );
        }
        structure.push("imports", StructuralElement::new(ElementKind::Import, "os", 1));
        structure.set_fact("dialect", "postgres");

        let (sliced, summaries) = slice_structure(&structure, SliceMode::Tail(2));
        let names: Vec<&str> = sliced.get("functions").iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["f5", "f6"]);
        assert_eq!(sliced.get("imports").len(), 1);
        assert_eq!(sliced.facts["dialect"], "postgres");
        assert_eq!(summaries[0].1.omitted_before, 4);
    }
}
