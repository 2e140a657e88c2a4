//! Channels of one APU instance.
//!
//! [`ChannelSet`] owns the channels of the 2A03 and its enabled expansions,
//! updates them in a fixed order and commits the shared PSG registers once the
//! last square of each PSG has run.

use tracing::{debug, trace};

use crate::bus::{ApuBus, RegisterWriter};
use crate::channel::{Channel, PendingNote};
use crate::channel_type::{ChannelType, Chip};
use crate::chip::SharedRegisters;
use crate::config::DriverConfig;
use crate::error::Result;
use crate::note::Note;
use crate::song::{NoteLocation, SongSource};

/// Expansion chips in channel order.
const CHIP_ORDER: [Chip; 7] = [
    Chip::Vrc6,
    Chip::Vrc7,
    Chip::Fds,
    Chip::Mmc5,
    Chip::N163,
    Chip::S5B,
    Chip::Epsm,
];

/// Channels of `chip`, in update order.
pub fn chip_channels(chip: Chip, n163_channels: u8) -> Vec<ChannelType> {
    match chip {
        Chip::Apu2A03 => ChannelType::apu_channels().to_vec(),
        Chip::Vrc6 => vec![
            ChannelType::Vrc6Square(0),
            ChannelType::Vrc6Square(1),
            ChannelType::Vrc6Saw,
        ],
        Chip::Vrc7 => (0..6).map(ChannelType::Vrc7Fm).collect(),
        Chip::Fds => vec![ChannelType::Fds],
        Chip::Mmc5 => vec![ChannelType::Mmc5Square(0), ChannelType::Mmc5Square(1)],
        Chip::N163 => (0..n163_channels.clamp(1, 8))
            .map(ChannelType::N163Wave)
            .collect(),
        Chip::S5B => (0..3).map(ChannelType::S5BSquare).collect(),
        Chip::Epsm => (0..3)
            .map(ChannelType::EpsmSquare)
            .chain((0..6).map(ChannelType::EpsmFm))
            .chain((0..6).map(ChannelType::EpsmRhythm))
            .collect(),
    }
}

/// Channel layout of a 2A03 with `expansions`.
pub fn channel_layout(expansions: &[Chip], n163_channels: u8) -> Vec<ChannelType> {
    let mut layout = chip_channels(Chip::Apu2A03, n163_channels);
    for chip in CHIP_ORDER {
        if expansions.contains(&chip) {
            layout.extend(chip_channels(chip, n163_channels));
        }
    }
    layout
}

/// All channels driven against one APU instance.
#[derive(Debug, Clone)]
pub struct ChannelSet {
    apu: usize,
    config: DriverConfig,
    channels: Vec<Channel>,
    commit_after: Vec<Option<Chip>>,
    shared: SharedRegisters,
}

impl ChannelSet {
    /// 2A03 plus `expansions`, writing to APU instance `apu`.
    pub fn new(apu: usize, expansions: &[Chip], config: DriverConfig) -> Result<Self> {
        config.validate()?;
        let layout = channel_layout(expansions, config.n163_channels);
        debug!(apu, channels = layout.len(), ?expansions, "channel set created");
        Ok(Self::with_channels(apu, &layout, config))
    }

    /// Explicit channel list, updated in the given order.
    pub fn with_channels(apu: usize, channel_types: &[ChannelType], config: DriverConfig) -> Self {
        let channels: Vec<Channel> = channel_types
            .iter()
            .map(|&t| Channel::new(t, &config))
            .collect();

        let mut commit_after = vec![None; channel_types.len()];
        for chip in [Chip::S5B, Chip::Epsm] {
            let last = channel_types
                .iter()
                .rposition(|t| t.is_psg_square() && t.chip() == chip);
            if let Some(index) = last {
                commit_after[index] = Some(chip);
            }
        }

        Self {
            apu,
            config,
            channels,
            commit_after,
            shared: SharedRegisters::default(),
        }
    }

    /// Process the row at `location` on every channel.
    ///
    /// `speed` is updated in place by speed effects.
    pub fn advance(
        &mut self,
        bus: &mut dyn ApuBus,
        song: &dyn SongSource,
        location: NoteLocation,
        speed: &mut u8,
    ) {
        let mut w = RegisterWriter::new(bus, self.apu, self.config.write_cycles);
        for channel in &mut self.channels {
            channel.advance(song, location, speed, &mut w);
        }
    }

    /// Run one frame on every channel. Returns the CPU cycles charged.
    pub fn update(&mut self, bus: &mut dyn ApuBus) -> u64 {
        let mut w = RegisterWriter::new(bus, self.apu, self.config.write_cycles);
        for (channel, commit) in self.channels.iter_mut().zip(&self.commit_after) {
            channel.update(&mut w, &mut self.shared);
            if let Some(chip) = commit {
                self.shared.commit(*chip, &mut w);
            }
        }
        trace!(apu = self.apu, writes = w.writes(), cycles = w.cycles(), "frame");
        w.cycles()
    }

    /// Play `note` on `channel_type` right away, outside the song.
    ///
    /// Returns false when the set has no such channel.
    pub fn play_note(
        &mut self,
        bus: &mut dyn ApuBus,
        channel_type: ChannelType,
        note: Note,
    ) -> bool {
        let apu = self.apu;
        let write_cycles = self.config.write_cycles;
        let Some(channel) = self.channel_mut(channel_type) else {
            return false;
        };
        let mut w = RegisterWriter::new(bus, apu, write_cycles);
        channel.play_note(PendingNote::plain(note), &mut w);
        true
    }

    /// Reset every channel, e.g. when playback restarts.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }

    /// Channel of `channel_type`.
    pub fn channel(&self, channel_type: ChannelType) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.channel_type() == channel_type)
    }

    fn channel_mut(&mut self, channel_type: ChannelType) -> Option<&mut Channel> {
        self.channels
            .iter_mut()
            .find(|c| c.channel_type() == channel_type)
    }

    /// All channels in update order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Shared PSG registers.
    pub fn shared(&self) -> &SharedRegisters {
        &self.shared
    }

    /// Configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// APU instance index.
    pub fn apu(&self) -> usize {
        self.apu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_chip_order() {
        let layout = channel_layout(&[Chip::S5B, Chip::Vrc6], 1);
        assert_eq!(layout.len(), 5 + 3 + 3);
        assert_eq!(layout[5], ChannelType::Vrc6Square(0));
        assert_eq!(layout[8], ChannelType::S5BSquare(0));
    }

    #[test]
    fn n163_channel_count_from_config() {
        let layout = channel_layout(&[Chip::N163], 4);
        assert_eq!(layout.last(), Some(&ChannelType::N163Wave(3)));
    }

    #[test]
    fn commit_follows_last_psg_square() {
        let set = ChannelSet::new(0, &[Chip::S5B, Chip::Epsm], DriverConfig::default()).unwrap();
        let commits: Vec<_> = set
            .commit_after
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|c| (set.channels[i].channel_type(), c)))
            .collect();
        assert_eq!(
            commits,
            vec![
                (ChannelType::S5BSquare(2), Chip::S5B),
                (ChannelType::EpsmSquare(2), Chip::Epsm)
            ]
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DriverConfig {
            n163_channels: 0,
            ..DriverConfig::default()
        };
        assert!(ChannelSet::new(0, &[], config).is_err());
    }
}
