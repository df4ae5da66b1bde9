//! MIDI-numbered pitch value type.
//!
//! A [`Pitch`] is identified only by its MIDI number. Names, octaves and staff
//! positions are derived on demand:
//!
//! ```text
//! midi = octave * 12 + pitch_class + 12
//! C4 = 60, A0 = 21, C#4 = 61
//! ```
//!
//! Staff positions count white-key letters away from middle C, so `C4` and
//! `C#4` are both 0, `D4` is 1, `B3` is -1 and `C5` is 7.

use crate::error::{PianolaError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const MIN_OCTAVE: i32 = 0;
const MAX_OCTAVE: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pitch {
    midi_number: i32,
}

impl Pitch {
    pub const fn new(midi_number: i32) -> Self {
        Self { midi_number }
    }

    pub fn midi_number(&self) -> i32 {
        self.midi_number
    }

    pub fn octave(&self) -> i32 {
        self.midi_number.div_euclid(12) - 1
    }

    /// Index into the chromatic scale starting at C (0..12).
    pub fn pitch_class(&self) -> usize {
        self.midi_number.rem_euclid(12) as usize
    }

    /// Note name without the octave, e.g. `"C"` or `"D#"`.
    pub fn note_name(&self) -> &'static str {
        NOTE_NAMES[self.pitch_class()]
    }

    /// Note name with the octave, e.g. `"A#0"` or `"C4"`.
    pub fn full_note_name(&self) -> String {
        format!("{}{}", self.note_name(), self.octave())
    }

    pub fn is_black_key(&self) -> bool {
        self.note_name().contains('#')
    }

    pub fn next_semitone(&self) -> Self {
        self.transpose(1)
    }

    pub fn previous_semitone(&self) -> Self {
        self.transpose(-1)
    }

    pub fn transpose(&self, semitones: i32) -> Self {
        Self::new(self.midi_number + semitones)
    }

    pub fn is_above(&self, other: &Pitch) -> bool {
        self.midi_number > other.midi_number
    }

    pub fn is_below(&self, other: &Pitch) -> bool {
        self.midi_number < other.midi_number
    }

    /// Position on the grand staff relative to middle C.
    pub fn staff_position(&self) -> i32 {
        let letter = self.note_name().as_bytes()[0];
        let mut distance = letter as i32 - b'C' as i32;
        if letter < b'C' {
            distance += 7;
        }
        distance + (self.octave() - 4) * 7
    }
}

impl FromStr for Pitch {
    type Err = PianolaError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PianolaError::InvalidPitchName(s.to_string());

        let mut chars = s.chars();
        let octave = chars
            .next_back()
            .and_then(|c| c.to_digit(10))
            .map(|d| d as i32)
            .ok_or_else(invalid)?;
        if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
            return Err(invalid());
        }

        let name = chars.as_str().to_uppercase();
        let pitch_class = NOTE_NAMES
            .iter()
            .position(|n| *n == name)
            .ok_or_else(invalid)?;

        Ok(Self::new(octave * 12 + pitch_class as i32 + 12))
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.note_name(), self.octave())
    }
}
