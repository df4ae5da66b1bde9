//! # Score Diagnostics
//!
//! Non-fatal checks run after the timing fold. None of these fail a parse;
//! they are logged and attached to the [`Timeline`](crate::Timeline) so a
//! caller can surface them.
//!
//! ## Checks
//! - **Empty timeline**: the document produced no notes. Playback still works
//!   but every navigation becomes a no-op.
//! - **Measure mismatch**: only the last part's measures are kept as the
//!   document-level list. Every other part is compared against it by measure
//!   count and boundaries.

use crate::score::{Measure, Note};
use serde::Serialize;
use std::fmt;

/// Measures produced by one part, in score order.
#[derive(Debug, Clone, PartialEq)]
pub struct PartMeasures {
    pub part_id: String,
    pub measures: Vec<Measure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ScoreWarning {
    EmptyTimeline,
    MeasureMismatch {
        part_id: String,
        /// Measure count of the retained part
        expected: usize,
        found: usize,
        /// First measure whose boundaries differ, if the counts agree
        first_difference: Option<usize>,
    },
}

impl fmt::Display for ScoreWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreWarning::EmptyTimeline => write!(f, "Score contains no playable notes"),
            ScoreWarning::MeasureMismatch {
                part_id,
                expected,
                found,
                first_difference: Some(index),
            } => write!(
                f,
                "Part {} disagrees with the measure list at measure {} ({} measures, expected {})",
                part_id, index, found, expected
            ),
            ScoreWarning::MeasureMismatch {
                part_id,
                expected,
                found,
                first_difference: None,
            } => write!(
                f,
                "Part {} has {} measures, expected {}",
                part_id, found, expected
            ),
        }
    }
}

/// Check a parsed score. The last entry of `parts` is the retained measure list.
pub fn validate(notes: &[Note], parts: &[PartMeasures]) -> Vec<ScoreWarning> {
    let mut warnings = Vec::new();

    if notes.is_empty() {
        warnings.push(ScoreWarning::EmptyTimeline);
    }

    let Some((retained, others)) = parts.split_last() else {
        return warnings;
    };

    for part in others {
        let expected = retained.measures.len();
        let found = part.measures.len();
        let first_difference = part
            .measures
            .iter()
            .zip(&retained.measures)
            .position(|(a, b)| a.start.ticks != b.start.ticks || a.end.ticks != b.end.ticks);

        if expected != found || first_difference.is_some() {
            warnings.push(ScoreWarning::MeasureMismatch {
                part_id: part.part_id.clone(),
                expected,
                found,
                first_difference: if expected == found {
                    first_difference
                } else {
                    None
                },
            });
        }
    }

    warnings
}
