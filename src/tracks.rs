//! Performable tracks derived from a timeline.
//!
//! One [`Track`] exists per part referenced by the timeline's notes. Tracks are
//! rebuilt with fresh flags every time a timeline is loaded.

use crate::pitch::Pitch;
use crate::score::Timeline;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// The part id this track plays
    pub id: String,
    pub name: String,
    /// Part declaration order, used for colours
    pub index: usize,
    /// Notes of active tracks sound and are highlighted
    pub active: bool,
    /// Playback waits for the user to play this track's notes
    pub wait: bool,
}

impl Track {
    /// Whether this track's notes are sounded by playback.
    pub fn sounds(&self) -> bool {
        self.active && !self.wait
    }
}

/// Distinct parts of the timeline's notes, sorted by part id, all active and
/// none waiting.
///
/// # Example
/// ```rust
/// use pianola::{derive_tracks, Timeline};
///
/// let tracks = derive_tracks(&Timeline::default());
/// assert!(tracks.is_empty());
/// ```
pub fn derive_tracks(timeline: &Timeline) -> Vec<Track> {
    let mut tracks: Vec<Track> = timeline
        .parts()
        .into_iter()
        .map(|part| Track {
            id: part.part_id.clone(),
            name: if part.part_name.is_empty() {
                part.part_id.clone()
            } else {
                part.part_name.clone()
            },
            index: part.index,
            active: true,
            wait: false,
        })
        .collect();
    tracks.sort_by(|a, b| a.id.cmp(&b.id));
    tracks
}

pub fn find_track<'a>(tracks: &'a [Track], part_id: &str) -> Option<&'a Track> {
    tracks.iter().find(|t| t.id == part_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Each channel scaled by 0.7.
    pub fn darker(&self) -> Self {
        let scale = |c: u8| (c as f64 * DARKER).round() as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

const DARKER: f64 = 0.7;

const TRACK_COLORS: [Rgb; 11] = [
    Rgb::new(220, 220, 80),
    Rgb::new(80, 220, 220),
    Rgb::new(220, 80, 220),
    Rgb::new(220, 80, 80),
    Rgb::new(80, 220, 80),
    Rgb::new(80, 80, 220),
    Rgb::new(250, 180, 0),
    Rgb::new(170, 210, 200),
    Rgb::new(230, 220, 120),
    Rgb::new(255, 240, 80),
    Rgb::new(220, 200, 230),
];

/// Colour for a note of the part at `part_index`. Black keys are darker.
pub fn track_color(part_index: usize, pitch: Pitch) -> Rgb {
    let base = TRACK_COLORS[part_index % TRACK_COLORS.len()];
    if pitch.is_black_key() {
        base.darker()
    } else {
        base
    }
}
