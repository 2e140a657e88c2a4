//! Note-to-period tables and per-channel tuning constants.
//!
//! Tables have [`NOTE_TABLE_SIZE`] entries indexed by musical note value;
//! index 0 is unused and holds 0. Period-based chips store timer periods,
//! frequency-based chips (FDS, N163, VRC7, EPSM FM) store frequency words.

use std::sync::Arc;

use crate::channel_type::ChannelType;
use crate::config::{DriverConfig, Machine};
use crate::note::{MUSICAL_NOTE_MAX, MUSICAL_NOTE_MIN, NOTE_TABLE_SIZE};

/// VRC7 master clock.
const VRC7_CLOCK: f64 = 3_579_545.0;
/// EPSM master clock.
const EPSM_CLOCK: f64 = 8_000_000.0;
/// Note value of A4.
const A4_NOTE: i32 = 58;

/// Largest period value a channel's registers can hold.
pub fn pitch_limit(channel: ChannelType) -> u16 {
    match channel {
        ChannelType::Square(_) | ChannelType::Triangle | ChannelType::Mmc5Square(_) => 0x7FF,
        ChannelType::Vrc6Square(_)
        | ChannelType::Vrc6Saw
        | ChannelType::Fds
        | ChannelType::S5BSquare(_)
        | ChannelType::EpsmSquare(_) => 0xFFF,
        ChannelType::N163Wave(_) | ChannelType::Vrc7Fm(_) | ChannelType::EpsmFm(_) => 0xFFFF,
        ChannelType::Noise | ChannelType::Dpcm => 0xF,
        ChannelType::EpsmRhythm(_) => 0xFF,
    }
}

/// Frequency in Hz of a musical note value for the given A4 tuning.
pub fn note_frequency(note: u8, tuning_hz: f64) -> f64 {
    tuning_hz * 2f64.powf((note as i32 - A4_NOTE) as f64 / 12.0)
}

/// Build the note table of `channel`.
pub fn note_table_for_channel(
    channel: ChannelType,
    machine: Machine,
    n163_channels: u8,
    tuning_hz: f64,
) -> Vec<u16> {
    let clock = machine.cpu_clock();
    let limit = pitch_limit(channel) as f64;
    let n163_channels = n163_channels.clamp(1, 8) as f64;

    let mut table = vec![0u16; NOTE_TABLE_SIZE];
    for note in MUSICAL_NOTE_MIN..=MUSICAL_NOTE_MAX {
        let f = note_frequency(note, tuning_hz);
        let value = match channel {
            ChannelType::Square(_) | ChannelType::Mmc5Square(_) | ChannelType::Vrc6Square(_) => {
                (clock / (16.0 * f)).round() - 1.0
            }
            ChannelType::Triangle => (clock / (32.0 * f)).round() - 1.0,
            ChannelType::Vrc6Saw => (clock / (14.0 * f)).round() - 1.0,
            ChannelType::Fds => (f * 65536.0 * 16.0 / clock).round(),
            ChannelType::N163Wave(_) => {
                ((f * 15.0 * 65536.0 * n163_channels * 16.0 / clock).round() as u64 >> 2) as f64
            }
            ChannelType::Vrc7Fm(_) => (f * (1u32 << 19) as f64 / (VRC7_CLOCK / 72.0)).round(),
            ChannelType::EpsmFm(_) => (f * (1u32 << 19) as f64 / (EPSM_CLOCK / 144.0)).round(),
            ChannelType::S5BSquare(_) => (clock / (16.0 * f)).round(),
            ChannelType::EpsmSquare(_) => (EPSM_CLOCK / (64.0 * f)).round(),
            ChannelType::Noise | ChannelType::Dpcm => (note & 0x0F) as f64,
            ChannelType::EpsmRhythm(_) => note as f64,
        };
        table[note as usize] = value.clamp(0.0, limit) as u16;
    }
    table
}

/// Chip constants a channel needs to turn notes into periods.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTuning {
    /// Note table.
    pub table: Arc<[u16]>,
    /// Largest period.
    pub max_period: u16,
    /// Left shift applied to fine pitch and pitch envelopes.
    pub pitch_shift: u8,
    /// Fractional bits of the slide accumulator.
    pub slide_shift: u8,
    /// Pitch offsets are subtracted (frequency-based chips).
    pub inverted_pitch: bool,
}

impl ChannelTuning {
    /// Tuning for `channel` under `config`.
    pub fn for_channel(channel: ChannelType, config: &DriverConfig) -> Self {
        let table = note_table_for_channel(
            channel,
            config.machine,
            config.n163_channels,
            config.tuning,
        );
        let (pitch_shift, slide_shift) = match channel {
            ChannelType::N163Wave(_) => (2, 2),
            ChannelType::Vrc7Fm(_) | ChannelType::EpsmFm(_) => (3, 2),
            _ => (0, 4),
        };
        Self {
            table: table.into(),
            max_period: pitch_limit(channel),
            pitch_shift,
            slide_shift,
            inverted_pitch: channel.is_frequency_based(),
        }
    }

    /// Tuning over a caller-provided table.
    pub fn custom(table: Vec<u16>, max_period: u16) -> Self {
        Self {
            table: table.into(),
            max_period,
            pitch_shift: 0,
            slide_shift: 4,
            inverted_pitch: false,
        }
    }

    /// Table entry for a note index that may fall outside the table.
    ///
    /// With `clamp` the index is pinned to the musical range. Without it the
    /// lookup behaves like the 6502 sound engine: the table is split into a low
    /// byte array followed by a high byte array, the index register wraps at 256
    /// and each half is read independently, so out-of-range notes produce the
    /// same deterministic garbage the hardware would.
    pub fn lookup(&self, index: i32, clamp: bool) -> u16 {
        let len = self.table.len();
        if len == 0 {
            return 0;
        }
        if clamp {
            let hi = (len - 1).min(MUSICAL_NOTE_MAX as usize) as i32;
            let lo = (MUSICAL_NOTE_MIN as i32).min(hi);
            return self.table[index.clamp(lo, hi) as usize];
        }
        if (0..len as i32).contains(&index) {
            return self.table[index as usize];
        }
        let wrapped = (index as u8) as usize;
        let byte = |k: usize| -> u16 {
            let k = k % (2 * len);
            if k < len {
                self.table[k] & 0xFF
            } else {
                self.table[k - len] >> 8
            }
        };
        byte(wrapped) | (byte(len + wrapped) << 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn a4_is_tuning_frequency() {
        assert_relative_eq!(note_frequency(58, 440.0), 440.0);
        assert_relative_eq!(note_frequency(70, 440.0), 880.0, epsilon = 1e-9);
    }

    #[test]
    fn ntsc_square_a4() {
        let table = note_table_for_channel(ChannelType::Square(0), Machine::Ntsc, 1, 440.0);
        assert_eq!(table.len(), NOTE_TABLE_SIZE);
        assert_eq!(table[0], 0);
        assert_eq!(table[58], 253);
        assert!(table.iter().all(|&p| p <= 0x7FF));
    }

    #[test]
    fn noise_table_wraps_every_16_notes() {
        let table = note_table_for_channel(ChannelType::Noise, Machine::Ntsc, 1, 440.0);
        assert_eq!(table[5], 5);
        assert_eq!(table[16], 0);
        assert_eq!(table[20], 4);
        assert_eq!(table[36], 4);
        assert_eq!(table[96], 0);
    }

    #[test]
    fn frequency_tables_rise_with_pitch() {
        let fds = note_table_for_channel(ChannelType::Fds, Machine::Ntsc, 1, 440.0);
        assert!(fds[60] > fds[59]);
        let n163 = note_table_for_channel(ChannelType::N163Wave(0), Machine::Ntsc, 1, 440.0);
        assert!(n163[40] > n163[39]);
    }

    #[test]
    fn clamped_lookup_pins_index() {
        let tuning = ChannelTuning::for_channel(ChannelType::Square(0), &DriverConfig::default());
        assert_eq!(tuning.lookup(-5, true), tuning.table[1]);
        assert_eq!(tuning.lookup(200, true), tuning.table[96]);
        assert_eq!(tuning.lookup(40, false), tuning.table[40]);
    }

    #[test]
    fn garbage_lookup_is_deterministic() {
        let table: Vec<u16> = (0..4).map(|i| 0x0100 * (i + 1) + i).collect();
        let tuning = ChannelTuning::custom(table.clone(), 0xFFFF);
        // index 5 in a 4 entry table: low byte from hi[1], high byte from lo[1].
        let value = tuning.lookup(5, false);
        assert_eq!(value & 0xFF, table[1] >> 8);
        assert_eq!(value >> 8, table[1] & 0xFF);
        assert_eq!(tuning.lookup(5, false), value);
    }
}
