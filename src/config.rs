//! Driver configuration.
//!
//! Settings a tracker usually keeps in global state (period clamping,
//! smooth vibrato, ...) are carried here and handed to every channel at
//! construction, so a channel never consults ambient state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

/// Console timing the note tables are computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Machine {
    /// 60Hz, 1.789773 MHz CPU.
    #[default]
    Ntsc,
    /// 50Hz, 1.662607 MHz CPU.
    Pal,
    /// 50Hz famiclone timing, 1.773448 MHz CPU.
    Dendy,
}

impl Machine {
    /// CPU clock in Hz.
    pub fn cpu_clock(self) -> f64 {
        match self {
            Machine::Ntsc => 1_789_773.0,
            Machine::Pal => 1_662_607.0,
            Machine::Dendy => 1_773_448.0,
        }
    }
}

/// Which player drives the channels.
///
/// The two players disagree on what counts as an "empty" envelope: the preview
/// player only skips envelopes without values, the accurate player also skips
/// envelopes that would never move away from their default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerMode {
    /// Cycle-accurate playback matching the exported sound engine.
    #[default]
    Accurate,
    /// Instrument preview / mixing player.
    Preview,
}

/// Configuration shared by every channel of a channel set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Console timing.
    pub machine: Machine,
    /// Player flavour.
    pub player: PlayerMode,
    /// Clamp out-of-range periods instead of emulating garbage reads.
    pub clamp_periods: bool,
    /// Use the sweep-unit trick on 2A03 squares to avoid phase resets.
    pub smooth_vibrato: bool,
    /// Reference pitch of A4 in Hz.
    pub tuning: f64,
    /// Number of active N163 channels (1..=8).
    pub n163_channels: u8,
    /// CPU cycles charged for a plain register write.
    pub write_cycles: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            machine: Machine::Ntsc,
            player: PlayerMode::Accurate,
            clamp_periods: true,
            smooth_vibrato: true,
            tuning: 440.0,
            n163_channels: 1,
            write_cycles: 4,
        }
    }
}

impl DriverConfig {
    /// Check values that would make note tables meaningless.
    pub fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.n163_channels) {
            return Err(DriverError::InvalidConfig(format!(
                "n163_channels must be in 1..=8, got {}",
                self.n163_channels
            )));
        }
        if !(self.tuning.is_finite() && (300.0..=600.0).contains(&self.tuning)) {
            return Err(DriverError::InvalidConfig(format!(
                "tuning must be within 300..=600 Hz, got {}",
                self.tuning
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DriverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = DriverConfig::from_json_str(r#"{ "machine": "pal", "clamp_periods": false }"#)
            .expect("valid config");
        assert_eq!(config.machine, Machine::Pal);
        assert!(!config.clamp_periods);
        assert!(config.smooth_vibrato);
        assert_eq!(config.n163_channels, 1);
    }

    #[test]
    fn json_round_trip() {
        let config = DriverConfig {
            player: PlayerMode::Preview,
            n163_channels: 4,
            ..DriverConfig::default()
        };
        let text = config.to_json_string().unwrap();
        assert_eq!(DriverConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_bad_n163_count() {
        let err = DriverConfig::from_json_str(r#"{ "n163_channels": 9 }"#).unwrap_err();
        assert!(matches!(err, DriverError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = DriverConfig::from_json_str("{ machine: ").unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
    }
}
