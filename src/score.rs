//! # Timeline Types
//!
//! The flat, time-indexed model produced by the parser and consumed by playback.
//!
//! ## Type Hierarchy
//! ```text
//! Timeline
//!   ├── Vec<Note>
//!   │     ├── pitch: Pitch
//!   │     ├── start / duration: TimeStamp
//!   │     ├── part: Arc<Part>
//!   │     └── measure_index
//!   ├── Vec<Measure> (last parsed part)
//!   │     ├── index, beats
//!   │     └── start / end: TimeStamp
//!   ├── length (ticks)
//!   └── Vec<ScoreWarning>
//! ```
//!
//! ## Time Units
//! Every time value is carried in two units:
//! - **ticks** - the markup's integer divisions. Playback runs on ticks.
//! - **whole notes** - an exact fraction, `ticks / (divisions_per_quarter * 4)`,
//!   using the divisions in effect when the time was consumed. Renderers that
//!   position notes by musical time use this unit.
//!
//! ## Invariants
//! - `note.duration.ticks > 0`
//! - chord members share `start` and `part`
//! - a tied group is a single note whose duration is the sum of its fragments
//! - `measures[i].end == measures[i + 1].start`

use crate::pitch::Pitch;
use crate::semantic::ScoreWarning;
use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedSub};
use serde::Serialize;
use std::sync::Arc;

/// A point or span in both time units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeStamp {
    pub ticks: i64,
    pub whole_notes: Rational64,
}

impl TimeStamp {
    pub const ZERO: TimeStamp = TimeStamp {
        ticks: 0,
        whole_notes: Rational64::new_raw(0, 1),
    };

    /// A span of `ticks` divisions at the given divisions-per-quarter.
    ///
    /// `None` when `divisions_per_quarter` is not positive or too large to
    /// express as a whole-note fraction.
    pub fn from_divisions(ticks: i64, divisions_per_quarter: i64) -> Option<Self> {
        let denominator = divisions_per_quarter.checked_mul(4).filter(|d| *d > 0)?;
        Some(Self {
            ticks,
            whole_notes: Rational64::new(ticks, denominator),
        })
    }

    pub fn whole_notes_f64(&self) -> f64 {
        *self.whole_notes.numer() as f64 / *self.whole_notes.denom() as f64
    }

    /// `None` on overflow in either unit.
    pub fn checked_add(&self, rhs: &TimeStamp) -> Option<TimeStamp> {
        Some(TimeStamp {
            ticks: self.ticks.checked_add(rhs.ticks)?,
            whole_notes: self.whole_notes.checked_add(&rhs.whole_notes)?,
        })
    }

    /// `None` on overflow in either unit.
    pub fn checked_sub(&self, rhs: &TimeStamp) -> Option<TimeStamp> {
        Some(TimeStamp {
            ticks: self.ticks.checked_sub(rhs.ticks)?,
            whole_notes: self.whole_notes.checked_sub(&rhs.whole_notes)?,
        })
    }
}

/// A declared `score-part`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub part_id: String,
    pub part_name: String,
    pub part_abbreviation: String,
    /// Declaration order, used for colour assignment
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub pitch: Pitch,
    pub start: TimeStamp,
    pub duration: TimeStamp,
    pub part: Arc<Part>,
    pub measure_index: usize,
}

impl Note {
    pub fn start_ticks(&self) -> i64 {
        self.start.ticks
    }

    pub fn end_ticks(&self) -> i64 {
        self.start_ticks().saturating_add(self.duration.ticks)
    }

    /// Whether the note is sounding at `position`: `start <= position < end`.
    pub fn is_sounding_at(&self, position: i64) -> bool {
        self.start_ticks() <= position && position < self.end_ticks()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub index: usize,
    pub start: TimeStamp,
    pub end: TimeStamp,
    /// Time-signature numerator in effect at the start of the measure
    pub beats: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub notes: Vec<Note>,
    pub measures: Vec<Measure>,
    /// `max(start + duration)` over all notes, in ticks
    pub length: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ScoreWarning>,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Distinct parts in order of first appearance among the notes.
    pub fn parts(&self) -> Vec<Arc<Part>> {
        let mut parts: Vec<Arc<Part>> = Vec::new();
        for note in &self.notes {
            if !parts.iter().any(|p| p.part_id == note.part.part_id) {
                parts.push(Arc::clone(&note.part));
            }
        }
        parts
    }

    /// The measure containing `position`, if any.
    pub fn measure_at(&self, position: i64) -> Option<&Measure> {
        self.measures
            .iter()
            .find(|m| m.start.ticks <= position && position < m.end.ticks)
    }
}
