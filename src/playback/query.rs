//! Pure note queries shared by the scheduler and external renderers.
//!
//! Every function here is a function of its arguments only; calling one twice
//! with the same inputs gives the same notes in the same (document) order.

use crate::pitch::Pitch;
use crate::score::{Note, Timeline};
use crate::tracks::{find_track, Track};
use std::collections::HashSet;

/// Notes of active tracks sounding at `position` (`start <= position < end`).
pub fn playing_notes<'a>(timeline: &'a Timeline, tracks: &[Track], position: i64) -> Vec<&'a Note> {
    timeline
        .notes
        .iter()
        .filter(|note| is_active(tracks, note))
        .filter(|note| note.is_sounding_at(position))
        .collect()
}

/// Notes of waiting tracks starting in `(prev_position, position]`, one per pitch.
pub fn waiting_notes<'a>(
    timeline: &'a Timeline,
    tracks: &[Track],
    prev_position: i64,
    position: i64,
) -> Vec<&'a Note> {
    dedup_by_pitch(timeline.notes.iter().filter(|note| {
        is_waiting(tracks, note)
            && prev_position < note.start_ticks()
            && note.start_ticks() <= position
    }))
}

/// Notes that playback should sound when moving from `from` to `to`: notes of
/// active, non-waiting tracks starting in `(from, to]`, one per pitch.
pub fn sounding_notes_between<'a>(
    timeline: &'a Timeline,
    tracks: &[Track],
    from: f64,
    to: f64,
) -> Vec<&'a Note> {
    dedup_by_pitch(timeline.notes.iter().filter(|note| {
        let start = note.start_ticks() as f64;
        find_track(tracks, &note.part.part_id).is_some_and(Track::sounds) && from < start && start <= to
    }))
}

/// Notes of any track starting within `window` ticks of `position`, one per pitch.
pub fn notes_near<'a>(timeline: &'a Timeline, position: i64, window: i64) -> Vec<&'a Note> {
    dedup_by_pitch(
        timeline
            .notes
            .iter()
            .filter(|note| (note.start_ticks() - position).abs() <= window),
    )
}

/// Keep the first note of every pitch, preserving order.
pub fn dedup_by_pitch<'a>(notes: impl IntoIterator<Item = &'a Note>) -> Vec<&'a Note> {
    let mut seen: HashSet<Pitch> = HashSet::new();
    notes
        .into_iter()
        .filter(|note| seen.insert(note.pitch))
        .collect()
}

pub(crate) fn is_active(tracks: &[Track], note: &Note) -> bool {
    find_track(tracks, &note.part.part_id).is_some_and(|t| t.active)
}

pub(crate) fn is_waiting(tracks: &[Track], note: &Note) -> bool {
    find_track(tracks, &note.part.part_id).is_some_and(|t| t.wait)
}
