//! Playback state type definitions

use crate::pitch::Pitch;
use crate::score::Note;
use serde::Serialize;
use std::collections::BTreeSet;

/// A loop region in ticks. Playback that runs past `end` jumps back to `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatRegion {
    pub enabled: bool,
    pub start: i64,
    pub end: i64,
}

impl RepeatRegion {
    /// Re-derive `enabled` after an edit: a region needs `start < end`.
    pub(crate) fn refresh(&mut self) {
        self.enabled = self.start < self.end;
    }
}

/// Everything the scheduler mutates while a timeline is loaded.
///
/// Reset on every load; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    /// Transport position in ticks
    pub position: i64,
    /// 50 is the baseline; the advance per tick scales with `tempo / 50`
    pub tempo: f64,
    pub playing: bool,
    /// Notes of waiting tracks the user still has to play, one per pitch
    pub waiting_notes: Vec<Note>,
    /// Notes of active tracks sounding at `position`
    pub playing_notes: Vec<Note>,
    /// Waiting notes at or before this tick have already been required
    pub min_waiting_position: i64,
    pub repeat: RepeatRegion,
    /// Pitches the user is holding down right now
    pub held: BTreeSet<Pitch>,
}

impl PlaybackState {
    pub fn new(tempo: f64) -> Self {
        Self {
            position: 0,
            tempo,
            playing: false,
            waiting_notes: Vec::new(),
            playing_notes: Vec::new(),
            min_waiting_position: 0,
            repeat: RepeatRegion::default(),
            held: BTreeSet::new(),
        }
    }

    pub fn is_waiting(&self) -> bool {
        !self.waiting_notes.is_empty()
    }
}

/// Result of one timer tick, telling the timer whether to keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stopped,
}

/// Keyboard navigation jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    NextNote,
    PreviousNote,
    NextMeasure,
    PreviousMeasure,
    Home,
    End,
    PageUp,
    PageDown,
}

/// Serializable view of the scheduler for renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub position: i64,
    pub tempo: f64,
    pub playing: bool,
    pub seeking: bool,
    pub waiting_pitches: Vec<Pitch>,
    pub playing_pitches: Vec<Pitch>,
    pub held_pitches: Vec<Pitch>,
    pub repeat: RepeatRegion,
    pub measure_index: Option<usize>,
}
