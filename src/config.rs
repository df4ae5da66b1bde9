//! Player configuration.
//!
//! All cadence constants of the scheduler live here. The defaults reproduce
//! the standard cadence (4 ticks every 50 ms at tempo 50, 10 seek steps of
//! 5 ms). A YAML file can override any subset:
//!
//! ```yaml
//! tick-amount: 4
//! tick-interval-ms: 50
//! tempo: 50
//! seek-steps: 10
//! seek-interval-ms: 5
//! page-divisor: 20
//! ```

use crate::error::{PianolaError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Tempo at which one tick advances the position by exactly `tick_amount`.
pub const BASELINE_TEMPO: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PlayerConfig {
    /// Ticks advanced per timer tick at the baseline tempo
    pub tick_amount: f64,
    pub tick_interval_ms: u64,
    /// Initial tempo; `tempo / 50` scales the advance
    pub tempo: f64,
    pub seek_steps: u32,
    pub seek_interval_ms: u64,
    /// Page up/down moves by `length / page_divisor`, rounded to whole ticks
    pub page_divisor: i64,
    /// Notes within this many ticks of a seek target sound when it lands
    pub seek_sound_window: i64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_amount: 4.0,
            tick_interval_ms: 50,
            tempo: BASELINE_TEMPO,
            seek_steps: 10,
            seek_interval_ms: 5,
            page_divisor: 20,
            seek_sound_window: 1,
        }
    }
}

impl PlayerConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: PlayerConfig =
            serde_yaml::from_str(content).map_err(|e| PianolaError::Config(e.to_string()))?;
        config.validated()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn validated(self) -> Result<Self> {
        if self.tick_interval_ms == 0 || self.seek_interval_ms == 0 {
            return Err(PianolaError::Config(
                "timer intervals must be at least 1 ms".to_string(),
            ));
        }
        if self.seek_steps == 0 {
            return Err(PianolaError::Config("seek-steps must be at least 1".to_string()));
        }
        if self.page_divisor <= 0 {
            return Err(PianolaError::Config("page-divisor must be positive".to_string()));
        }
        Ok(self)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn seek_interval(&self) -> Duration {
        Duration::from_millis(self.seek_interval_ms)
    }
}
