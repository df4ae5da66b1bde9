pub mod config;
pub mod error;
pub mod events;
pub mod parser;
pub mod pitch;
pub mod playback;
pub mod score;
pub mod semantic;
pub mod tracks;

pub use config::PlayerConfig;
pub use error::*;
pub use parser::parse;
pub use pitch::Pitch;
pub use playback::{Navigation, NoteOutput, Player, TickOutcome, Transport};
pub use score::{Measure, Note, Part, TimeStamp, Timeline};
pub use semantic::ScoreWarning;
pub use tracks::{derive_tracks, track_color, Rgb, Track};

use std::path::Path;

/// Read and parse a score file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Timeline> {
    let markup = std::fs::read_to_string(path)?;
    parse(&markup)
}

/// Parse a score and load it into a fresh player.
/// This is the main entry point for the library.
pub fn load_player<O: NoteOutput>(markup: &str, config: PlayerConfig, output: O) -> Result<Player<O>> {
    let timeline = parse(markup)?;
    Ok(Player::new(timeline, config, output))
}
