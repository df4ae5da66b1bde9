//! # Error Types
//!
//! This module defines all error types for pianola.
//!
//! ## Error Types
//! - `MalformedScore` - The score markup is not well-formed (no partial timeline is returned)
//! - `InvalidPitchName` - A pitch literal such as `"H4"` or `"C9"` was rejected
//! - `Config` - Invalid YAML player configuration
//! - `Io` - Reading a score or configuration file failed
//!
//! Empty scores are not errors: they parse to an empty timeline and are reported
//! as a [`ScoreWarning`](crate::semantic::ScoreWarning) instead.
//!
//! ## Usage
//! ```rust
//! use pianola::{parse, PianolaError};
//!
//! match parse("<score-partwise><part></score-partwise>") {
//!     Ok(timeline) => println!("{} notes", timeline.notes.len()),
//!     Err(PianolaError::MalformedScore { position, message }) => {
//!         eprintln!("Malformed score at byte {}: {}", position, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PianolaError {
    /// The score markup could not be read.
    ///
    /// # Example
    /// ```
    /// # use pianola::PianolaError;
    /// let err = PianolaError::MalformedScore {
    ///     position: 42,
    ///     message: "expected </measure>".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Malformed score at byte 42: expected </measure>");
    /// ```
    #[error("Malformed score at byte {position}: {message}")]
    MalformedScore { position: usize, message: String },

    /// A pitch name outside `A0`..`G8` or with an unknown letter.
    ///
    /// # Example
    /// ```
    /// # use pianola::PianolaError;
    /// let err = PianolaError::InvalidPitchName("H4".to_string());
    /// assert_eq!(err.to_string(), "Invalid pitch name: H4");
    /// ```
    #[error("Invalid pitch name: {0}")]
    InvalidPitchName(String),

    #[error("Invalid player configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PianolaError>;
