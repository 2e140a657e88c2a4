//! Register emission, one driver per chip family.
//!
//! [`ChipChannel`] dispatches the per-channel hooks to the right driver. The
//! hooks all take the channel's [`ChannelState`] and a [`RegisterWriter`];
//! PSG squares additionally get the [`SharedRegisters`] of their chip.

pub mod apu;
pub mod epsm;
pub mod fds;
pub mod mmc5;
pub mod n163;
pub mod psg;
pub mod vrc6;
pub mod vrc7;

use std::sync::Arc;

pub use apu::{ApuDpcm, ApuNoise, ApuSquare, ApuStatus, ApuTriangle};
pub use epsm::{EpsmFm, EpsmRhythm};
pub use fds::FdsChannel;
pub use mmc5::Mmc5Square;
pub use n163::{N163Channel, N163Upload};
pub use psg::{MixerFlags, PsgPorts, PsgSharedState, PsgSquare};
pub use vrc6::{Vrc6Saw, Vrc6Square};
pub use vrc7::Vrc7Fm;

use crate::bus::RegisterWriter;
use crate::channel::ChannelState;
use crate::channel_type::{ChannelType, Chip};
use crate::config::DriverConfig;
use crate::envelope::{EnvelopeCursor, EnvelopeKind};
use crate::instrument::Instrument;

/// Shared PSG registers of the chips in a channel set.
#[derive(Debug, Clone, Default)]
pub struct SharedRegisters {
    /// Sunsoft 5B.
    pub s5b: PsgSharedState,
    /// EPSM SSG.
    pub epsm: PsgSharedState,
}

impl SharedRegisters {
    /// Shared state of `chip`'s PSG, if it has one.
    pub fn psg_mut(&mut self, chip: Chip) -> Option<&mut PsgSharedState> {
        match chip {
            Chip::S5B => Some(&mut self.s5b),
            Chip::Epsm => Some(&mut self.epsm),
            _ => None,
        }
    }

    /// Write what `chip`'s squares contributed this frame.
    pub fn commit(&mut self, chip: Chip, w: &mut RegisterWriter) {
        let ports = PsgPorts::for_chip(chip);
        if let Some(shared) = self.psg_mut(chip) {
            shared.commit(ports, w);
        }
    }
}

/// Chip-specific half of a channel.
#[derive(Debug, Clone)]
pub enum ChipChannel {
    /// 2A03 square
    Square(ApuSquare),
    /// 2A03 triangle
    Triangle(ApuTriangle),
    /// 2A03 noise
    Noise(ApuNoise),
    /// 2A03 DMC
    Dpcm(ApuDpcm),
    /// MMC5 square
    Mmc5Square(Mmc5Square),
    /// VRC6 square
    Vrc6Square(Vrc6Square),
    /// VRC6 sawtooth
    Vrc6Saw(Vrc6Saw),
    /// VRC7 FM
    Vrc7(Vrc7Fm),
    /// FDS wavetable
    Fds(FdsChannel),
    /// N163 wavetable
    N163(N163Channel),
    /// 5B or EPSM SSG square
    PsgSquare(PsgSquare),
    /// EPSM FM
    EpsmFm(EpsmFm),
    /// EPSM rhythm
    EpsmRhythm(EpsmRhythm),
}

impl ChipChannel {
    /// Driver for `channel`.
    pub fn new(channel: ChannelType, config: &DriverConfig) -> Self {
        match channel {
            ChannelType::Square(i) => ChipChannel::Square(ApuSquare::new(i)),
            ChannelType::Triangle => ChipChannel::Triangle(ApuTriangle),
            ChannelType::Noise => ChipChannel::Noise(ApuNoise),
            ChannelType::Dpcm => ChipChannel::Dpcm(ApuDpcm::default()),
            ChannelType::Mmc5Square(i) => ChipChannel::Mmc5Square(Mmc5Square::new(i)),
            ChannelType::Vrc6Square(i) => ChipChannel::Vrc6Square(Vrc6Square::new(i)),
            ChannelType::Vrc6Saw => ChipChannel::Vrc6Saw(Vrc6Saw),
            ChannelType::Vrc7Fm(i) => ChipChannel::Vrc7(Vrc7Fm::new(i)),
            ChannelType::Fds => ChipChannel::Fds(FdsChannel::default()),
            ChannelType::N163Wave(i) => {
                ChipChannel::N163(N163Channel::new(i, config.n163_channels))
            }
            ChannelType::S5BSquare(i) => ChipChannel::PsgSquare(PsgSquare::new(Chip::S5B, i)),
            ChannelType::EpsmSquare(i) => ChipChannel::PsgSquare(PsgSquare::new(Chip::Epsm, i)),
            ChannelType::EpsmFm(i) => ChipChannel::EpsmFm(EpsmFm::new(i)),
            ChannelType::EpsmRhythm(i) => ChipChannel::EpsmRhythm(EpsmRhythm::new(i)),
        }
    }

    /// Emit this frame's registers.
    pub(crate) fn update_apu(
        &mut self,
        state: &mut ChannelState,
        w: &mut RegisterWriter,
        shared: &mut SharedRegisters,
    ) {
        match self {
            ChipChannel::Square(c) => c.update_apu(state, w),
            ChipChannel::Triangle(c) => c.update_apu(state, w),
            ChipChannel::Noise(c) => c.update_apu(state, w),
            ChipChannel::Dpcm(c) => c.update_apu(state, w),
            ChipChannel::Mmc5Square(c) => c.update_apu(state, w),
            ChipChannel::Vrc6Square(c) => c.update_apu(state, w),
            ChipChannel::Vrc6Saw(c) => c.update_apu(state, w),
            ChipChannel::Vrc7(c) => c.update_apu(state, w),
            ChipChannel::Fds(c) => c.update_apu(state, w),
            ChipChannel::N163(c) => c.update_apu(state, w),
            ChipChannel::PsgSquare(c) => {
                if let Some(psg) = shared.psg_mut(state.channel_type().chip()) {
                    c.update_apu(state, w, psg);
                }
            }
            ChipChannel::EpsmFm(c) => c.update_apu(state, w),
            ChipChannel::EpsmRhythm(c) => c.update_apu(state, w),
        }
    }

    /// Upload instrument data that lives in chip memory.
    pub(crate) fn load_instrument(&mut self, instrument: &Arc<Instrument>, w: &mut RegisterWriter) {
        match self {
            ChipChannel::Vrc7(c) => c.load_instrument(instrument, w),
            ChipChannel::Fds(c) => c.load_instrument(instrument, w),
            ChipChannel::N163(c) => c.load_instrument(instrument, w),
            ChipChannel::EpsmFm(c) => c.load_instrument(instrument),
            _ => {}
        }
    }

    /// Restart the waveform without retriggering the note.
    pub(crate) fn reset_phase(&mut self, state: &ChannelState, w: &mut RegisterWriter) {
        match self {
            ChipChannel::Square(c) => c.reset_phase(state, w),
            ChipChannel::Vrc6Square(c) => c.reset_phase(state, w),
            ChipChannel::Vrc6Saw(c) => c.reset_phase(state, w),
            ChipChannel::N163(c) => c.reset_phase(state, w),
            _ => {}
        }
    }

    /// End-of-frame bookkeeping after the registers went out.
    pub(crate) fn post_update(&mut self) {
        if let ChipChannel::Fds(c) = self {
            c.post_update();
        }
    }

    /// Frame the channel displays for envelope `kind` in a register viewer.
    pub fn envelope_frame(&self, state: &ChannelState, kind: EnvelopeKind) -> Option<usize> {
        match (self, kind) {
            (ChipChannel::N163(c), EnvelopeKind::WaveformRepeat) => c.envelope_frame(state),
            _ => match state.envelope_cursor(kind) {
                EnvelopeCursor::Active(index) => Some(index),
                _ => None,
            },
        }
    }

    /// N163 driver, if this is one.
    pub fn as_n163(&self) -> Option<&N163Channel> {
        match self {
            ChipChannel::N163(c) => Some(c),
            _ => None,
        }
    }

    /// VRC7 driver, if this is one.
    pub fn as_vrc7(&self) -> Option<&Vrc7Fm> {
        match self {
            ChipChannel::Vrc7(c) => Some(c),
            _ => None,
        }
    }

    /// EPSM FM driver, if this is one.
    pub fn as_epsm_fm(&self) -> Option<&EpsmFm> {
        match self {
            ChipChannel::EpsmFm(c) => Some(c),
            _ => None,
        }
    }

    /// FDS driver, if this is one.
    pub fn as_fds(&self) -> Option<&FdsChannel> {
        match self {
            ChipChannel::Fds(c) => Some(c),
            _ => None,
        }
    }
}
