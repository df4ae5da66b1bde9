//! # Playback Module
//!
//! Practice playback over a parsed [`Timeline`](crate::Timeline).
//!
//! ## Purpose
//! This module advances a tick position through the score and decides which
//! notes to sound, which to highlight and which the user still has to play:
//! 1. **Playback** - notes of active tracks sound as the position passes them
//! 2. **Wait mode** - notes of waiting tracks hold the position until played
//! 3. **Navigation** - smooth seeks to the next note, measure or page
//! 4. **Repeat** - a loop region the position wraps around
//!
//! ## Sub-modules
//! - `types` - PlaybackState, RepeatRegion, Navigation, PlaybackSnapshot
//! - `query` - Pure note queries (playing, waiting, sounding)
//! - `navigation` - Jump targets for keyboard navigation
//! - `player` - The scheduler state machine
//! - `transport` - Timer threads driving a shared player
//!
//! ## Example
//! ```rust
//! use pianola::playback::Player;
//! use pianola::{parse, Pitch, PlayerConfig};
//!
//! let score = r#"<score-partwise>
//!   <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
//!   <part id="P1"><measure>
//!     <attributes><divisions>2</divisions></attributes>
//!     <note><rest/><duration>2</duration></note>
//!     <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration></note>
//!   </measure></part>
//! </score-partwise>"#;
//!
//! let mut player = Player::new(parse(score).unwrap(), PlayerConfig::default(), Vec::<Pitch>::new());
//! player.toggle_play();
//! player.tick(4.0);
//!
//! assert_eq!(player.position(), 4);
//! assert_eq!(player.output(), &vec!["C4".parse::<Pitch>().unwrap()]);
//! ```
//!
//! ## Timing
//!
//! Every tick advances the position by `amount * tempo / 50`. The
//! [`Transport`] fires a tick of `tick-amount` every `tick-interval-ms`, so at
//! the default cadence playback moves 80 ticks per second at tempo 50.

mod navigation;
mod player;
pub mod query;
mod transport;
mod types;


pub use navigation::navigation_target;
pub use player::{NoteOutput, Player};
pub use transport::{TimerTask, Transport};
pub use types::{Navigation, PlaybackSnapshot, PlaybackState, RepeatRegion, TickOutcome};
