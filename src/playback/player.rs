//! Playback scheduler state machine.
//!
//! [`Player`] owns the loaded [`Timeline`], its [`Track`]s and the
//! [`PlaybackState`]. It does no timing of its own: a driver (normally
//! [`Transport`](super::Transport)) calls [`Player::tick`] on a recurring
//! timer and [`Player::seek_step`] while a smooth seek is in flight.
//!
//! ## States
//! ```text
//!            toggle_play                 tick reaches length
//! Stopped ──────────────▶ Playing ──────────────────────────▶ Stopped
//!    ▲                       │
//!    └───── toggle_play ─────┘
//!
//! Seeking (orthogonal): begin_seek ─▶ seek_step × N ─▶ done
//! ```
//! While a seek is in flight, ticks leave the state untouched.
//!
//! ## Wait Mode
//! When a tick finds notes of waiting tracks in its scan window, the position
//! holds until [`Player::note_on`] has acknowledged every one of those pitches.

use super::navigation::navigation_target;
use super::query;
use super::types::{Navigation, PlaybackSnapshot, PlaybackState, RepeatRegion, TickOutcome};
use crate::config::{PlayerConfig, BASELINE_TEMPO};
use crate::pitch::Pitch;
use crate::score::{Note, Timeline};
use crate::tracks::{derive_tracks, Track};
use crossbeam_channel::Sender;
use tracing::{debug, trace};

/// Receiver of "sound this pitch now" signals. The only side effect of playback.
pub trait NoteOutput: Send {
    fn sound_note(&mut self, pitch: Pitch);
}

/// Records every sounded pitch.
impl NoteOutput for Vec<Pitch> {
    fn sound_note(&mut self, pitch: Pitch) {
        self.push(pitch);
    }
}

/// Forwards sounded pitches to a consumer thread.
impl NoteOutput for Sender<Pitch> {
    fn sound_note(&mut self, pitch: Pitch) {
        if self.send(pitch).is_err() {
            trace!(%pitch, "note output disconnected");
        }
    }
}

/// Linear animation of the position towards a seek target.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SeekAnimation {
    from: i64,
    to: i64,
    step: u32,
    steps: u32,
}

impl SeekAnimation {
    fn position(&self) -> i64 {
        let fraction = self.step as f64 / self.steps as f64;
        (self.from as f64 + (self.to - self.from) as f64 * fraction).round() as i64
    }

    fn is_done(&self) -> bool {
        self.step >= self.steps
    }
}

pub struct Player<O: NoteOutput> {
    timeline: Timeline,
    tracks: Vec<Track>,
    state: PlaybackState,
    config: PlayerConfig,
    output: O,
    seek: Option<SeekAnimation>,
}

impl<O: NoteOutput> Player<O> {
    pub fn new(timeline: Timeline, config: PlayerConfig, output: O) -> Self {
        let tracks = derive_tracks(&timeline);
        let state = PlaybackState::new(config.tempo);
        let mut player = Self {
            timeline,
            tracks,
            state,
            config,
            output,
            seek: None,
        };
        player.refresh_playing_notes();
        player
    }

    /// Replace the timeline. Tracks and playback state start fresh.
    pub fn load(&mut self, timeline: Timeline) {
        debug!(
            notes = timeline.notes.len(),
            length = timeline.length,
            "loading timeline"
        );
        self.tracks = derive_tracks(&timeline);
        self.timeline = timeline;
        self.state = PlaybackState::new(self.config.tempo);
        self.seek = None;
        self.refresh_playing_notes();
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn position(&self) -> i64 {
        self.state.position
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    pub fn is_seeking(&self) -> bool {
        self.seek.is_some()
    }

    pub fn waiting_notes(&self) -> &[Note] {
        &self.state.waiting_notes
    }

    pub fn playing_notes(&self) -> &[Note] {
        &self.state.playing_notes
    }

    pub fn repeat(&self) -> RepeatRegion {
        self.state.repeat
    }

    /// Start or stop playback. Returns whether playback is now running.
    pub fn toggle_play(&mut self) -> bool {
        if self.state.playing {
            self.state.playing = false;
            debug!(position = self.state.position, "playback stopped");
        } else {
            self.state.playing = true;
            self.state.waiting_notes.clear();
            self.state.min_waiting_position = self.state.position;
            debug!(position = self.state.position, "playback started");
        }
        self.state.playing
    }

    pub fn stop(&mut self) {
        if self.state.playing {
            self.toggle_play();
        }
    }

    /// Advance playback by `amount` ticks scaled by `tempo / 50`.
    ///
    /// Returns [`TickOutcome::Stopped`] once playback is no longer running, so a
    /// stale timer can shut itself down.
    pub fn tick(&mut self, amount: f64) -> TickOutcome {
        if !self.state.playing {
            return TickOutcome::Stopped;
        }
        if self.seek.is_some() {
            return TickOutcome::Continue;
        }

        let position = self.state.position;
        let advance = amount * self.state.tempo / BASELINE_TEMPO;

        let due: Vec<Pitch> = query::sounding_notes_between(
            &self.timeline,
            &self.tracks,
            position as f64,
            position as f64 + advance,
        )
        .into_iter()
        .map(|note| note.pitch)
        .collect();
        for pitch in due {
            self.output.sound_note(pitch);
        }

        if self.state.waiting_notes.is_empty() {
            let candidate = (position as f64 + advance).round() as i64;
            let repeat = self.state.repeat;
            let wrapped = repeat.enabled && candidate > repeat.end;

            let (target, scan_from) = if wrapped {
                (repeat.start, -1)
            } else {
                (candidate, self.state.min_waiting_position.max(position))
            };

            let waiting: Vec<Note> =
                query::waiting_notes(&self.timeline, &self.tracks, scan_from, target)
                    .into_iter()
                    .cloned()
                    .collect();

            if waiting.is_empty() {
                self.state.position = target;
                self.state.min_waiting_position = if wrapped { 0 } else { target };
            } else {
                trace!(
                    position,
                    waiting = waiting.len(),
                    "waiting for the user to play"
                );
                if wrapped {
                    self.state.position = target;
                }
                self.state.min_waiting_position = target;
            }
            self.state.waiting_notes = waiting;

            if candidate >= self.timeline.length {
                self.state.playing = false;
                debug!(position = self.state.position, "reached the end of the score");
            }
        }

        self.refresh_playing_notes();

        if self.state.playing {
            TickOutcome::Continue
        } else {
            TickOutcome::Stopped
        }
    }

    /// Jump straight to `position`, e.g. while scrubbing.
    pub fn seek_to(&mut self, position: i64) {
        self.seek = None;
        self.state.position = position;
        self.state.waiting_notes.clear();
        self.state.min_waiting_position = 0;
        self.refresh_playing_notes();
    }

    /// Start a smooth seek to `target`, replacing any seek already in flight.
    pub fn begin_seek(&mut self, target: i64) {
        self.seek = Some(SeekAnimation {
            from: self.state.position,
            to: target,
            step: 0,
            steps: self.config.seek_steps.max(1),
        });
    }

    /// Advance the in-flight seek by one step. Returns whether more steps remain.
    ///
    /// The final step sounds every note starting near the target, whatever the
    /// flags of its track.
    pub fn seek_step(&mut self) -> bool {
        let Some(animation) = self.seek.as_mut() else {
            return false;
        };
        animation.step += 1;
        let animation = *animation;

        self.state.position = animation.position();
        self.state.waiting_notes.clear();
        self.state.min_waiting_position = 0;
        self.refresh_playing_notes();

        if !animation.is_done() {
            return true;
        }

        self.seek = None;
        let landed: Vec<Pitch> =
            query::notes_near(&self.timeline, animation.to, self.config.seek_sound_window)
                .into_iter()
                .map(|note| note.pitch)
                .collect();
        for pitch in landed {
            self.output.sound_note(pitch);
        }
        false
    }

    /// Run the in-flight seek to completion without waiting between steps.
    pub fn finish_seek(&mut self) {
        while self.seek_step() {}
    }

    /// Start a smooth seek towards a navigation target. Returns the target, or
    /// `None` when there is nowhere to go.
    pub fn navigate(&mut self, navigation: Navigation) -> Option<i64> {
        let target = self.navigation_target(navigation)?;
        self.begin_seek(target);
        Some(target)
    }

    pub fn navigation_target(&self, navigation: Navigation) -> Option<i64> {
        navigation_target(
            navigation,
            &self.timeline,
            &self.tracks,
            self.state.position,
            self.config.page_divisor,
        )
    }

    /// A key went down on the user's instrument.
    pub fn note_on(&mut self, pitch: Pitch) {
        self.state.waiting_notes.retain(|note| note.pitch != pitch);
        self.state.held.insert(pitch);
    }

    pub fn note_off(&mut self, pitch: Pitch) {
        self.state.held.remove(&pitch);
    }

    pub fn held_pitches(&self) -> impl Iterator<Item = Pitch> + '_ {
        self.state.held.iter().copied()
    }

    pub fn tempo(&self) -> f64 {
        self.state.tempo
    }

    pub fn set_tempo(&mut self, tempo: f64) {
        self.state.tempo = tempo;
    }

    pub fn set_track_active(&mut self, track_id: &str, active: bool) -> bool {
        self.update_track(track_id, |track| track.active = active)
    }

    pub fn set_track_wait(&mut self, track_id: &str, wait: bool) -> bool {
        self.update_track(track_id, |track| track.wait = wait)
    }

    pub fn toggle_track_active(&mut self, track_id: &str) -> bool {
        self.update_track(track_id, |track| track.active = !track.active)
    }

    pub fn toggle_track_wait(&mut self, track_id: &str) -> bool {
        self.update_track(track_id, |track| track.wait = !track.wait)
    }

    fn update_track(&mut self, track_id: &str, change: impl FnOnce(&mut Track)) -> bool {
        let Some(track) = self.tracks.iter_mut().find(|t| t.id == track_id) else {
            return false;
        };
        change(track);

        // Notes of a track that stopped waiting no longer block playback.
        let tracks = &self.tracks;
        self.state
            .waiting_notes
            .retain(|note| query::is_waiting(tracks, note));
        self.refresh_playing_notes();
        true
    }

    /// Repeat from the current position.
    pub fn set_repeat_start(&mut self) {
        self.state.repeat.start = self.state.position;
        self.state.repeat.refresh();
    }

    /// Repeat up to the current position.
    pub fn set_repeat_end(&mut self) {
        self.state.repeat.end = self.state.position;
        self.state.repeat.refresh();
    }

    pub fn set_repeat_region(&mut self, start: i64, end: i64) {
        self.state.repeat.start = start;
        self.state.repeat.end = end;
        self.state.repeat.refresh();
    }

    pub fn clear_repeat(&mut self) {
        self.state.repeat = RepeatRegion::default();
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let pitches = |notes: &[Note]| -> Vec<Pitch> { notes.iter().map(|n| n.pitch).collect() };
        PlaybackSnapshot {
            position: self.state.position,
            tempo: self.state.tempo,
            playing: self.state.playing,
            seeking: self.is_seeking(),
            waiting_pitches: pitches(&self.state.waiting_notes),
            playing_pitches: pitches(&self.state.playing_notes),
            held_pitches: self.held_pitches().collect(),
            repeat: self.state.repeat,
            measure_index: self
                .timeline
                .measure_at(self.state.position)
                .map(|m| m.index),
        }
    }

    fn refresh_playing_notes(&mut self) {
        self.state.playing_notes =
            query::playing_notes(&self.timeline, &self.tracks, self.state.position)
                .into_iter()
                .cloned()
                .collect();
    }
}
