//! Channel and chip identifiers.

use std::fmt;

/// Sound chip a channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Chip {
    /// Built-in 2A03 APU.
    Apu2A03,
    /// Konami VRC6.
    Vrc6,
    /// Konami VRC7 (OPLL derivative).
    Vrc7,
    /// Famicom Disk System.
    Fds,
    /// Nintendo MMC5.
    Mmc5,
    /// Namco 163.
    N163,
    /// Sunsoft 5B (YM2149 derivative).
    S5B,
    /// EPSM (YM2608).
    Epsm,
}

/// One logical audio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelType {
    /// 2A03 square 0..=1.
    Square(u8),
    /// 2A03 triangle.
    Triangle,
    /// 2A03 noise.
    Noise,
    /// 2A03 delta modulation channel.
    Dpcm,
    /// VRC6 square 0..=1.
    Vrc6Square(u8),
    /// VRC6 sawtooth.
    Vrc6Saw,
    /// VRC7 FM 0..=5.
    Vrc7Fm(u8),
    /// FDS wavetable.
    Fds,
    /// MMC5 square 0..=1.
    Mmc5Square(u8),
    /// N163 wavetable 0..=7.
    N163Wave(u8),
    /// Sunsoft 5B square 0..=2.
    S5BSquare(u8),
    /// EPSM SSG square 0..=2.
    EpsmSquare(u8),
    /// EPSM FM 0..=5.
    EpsmFm(u8),
    /// EPSM rhythm 0..=5.
    EpsmRhythm(u8),
}

impl ChannelType {
    /// Chip owning this channel.
    pub fn chip(self) -> Chip {
        match self {
            ChannelType::Square(_)
            | ChannelType::Triangle
            | ChannelType::Noise
            | ChannelType::Dpcm => Chip::Apu2A03,
            ChannelType::Vrc6Square(_) | ChannelType::Vrc6Saw => Chip::Vrc6,
            ChannelType::Vrc7Fm(_) => Chip::Vrc7,
            ChannelType::Fds => Chip::Fds,
            ChannelType::Mmc5Square(_) => Chip::Mmc5,
            ChannelType::N163Wave(_) => Chip::N163,
            ChannelType::S5BSquare(_) => Chip::S5B,
            ChannelType::EpsmSquare(_) | ChannelType::EpsmFm(_) | ChannelType::EpsmRhythm(_) => {
                Chip::Epsm
            }
        }
    }

    /// Index of the channel inside its own group.
    pub fn index(self) -> usize {
        match self {
            ChannelType::Square(i)
            | ChannelType::Vrc6Square(i)
            | ChannelType::Vrc7Fm(i)
            | ChannelType::Mmc5Square(i)
            | ChannelType::N163Wave(i)
            | ChannelType::S5BSquare(i)
            | ChannelType::EpsmSquare(i)
            | ChannelType::EpsmFm(i)
            | ChannelType::EpsmRhythm(i) => i as usize,
            ChannelType::Triangle | ChannelType::Noise | ChannelType::Dpcm => 0,
            ChannelType::Vrc6Saw | ChannelType::Fds => 0,
        }
    }

    /// Channels whose period register counts up with pitch rather than down.
    pub fn is_frequency_based(self) -> bool {
        matches!(
            self,
            ChannelType::Fds
                | ChannelType::N163Wave(_)
                | ChannelType::Vrc7Fm(_)
                | ChannelType::EpsmFm(_)
        )
    }

    /// Channels sharing the mixer/noise/envelope registers of a PSG.
    pub fn is_psg_square(self) -> bool {
        matches!(self, ChannelType::S5BSquare(_) | ChannelType::EpsmSquare(_))
    }

    /// The 2A03 channels, in update order.
    pub fn apu_channels() -> [ChannelType; 5] {
        [
            ChannelType::Square(0),
            ChannelType::Square(1),
            ChannelType::Triangle,
            ChannelType::Noise,
            ChannelType::Dpcm,
        ]
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelType::Square(i) => write!(f, "Square {}", i + 1),
            ChannelType::Triangle => write!(f, "Triangle"),
            ChannelType::Noise => write!(f, "Noise"),
            ChannelType::Dpcm => write!(f, "DPCM"),
            ChannelType::Vrc6Square(i) => write!(f, "VRC6 Square {}", i + 1),
            ChannelType::Vrc6Saw => write!(f, "VRC6 Saw"),
            ChannelType::Vrc7Fm(i) => write!(f, "VRC7 FM {}", i + 1),
            ChannelType::Fds => write!(f, "FDS"),
            ChannelType::Mmc5Square(i) => write!(f, "MMC5 Square {}", i + 1),
            ChannelType::N163Wave(i) => write!(f, "N163 Wave {}", i + 1),
            ChannelType::S5BSquare(i) => write!(f, "5B Square {}", i + 1),
            ChannelType::EpsmSquare(i) => write!(f, "EPSM Square {}", i + 1),
            ChannelType::EpsmFm(i) => write!(f, "EPSM FM {}", i + 1),
            ChannelType::EpsmRhythm(i) => write!(f, "EPSM Rhythm {}", i + 1),
        }
    }
}
