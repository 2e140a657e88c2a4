//! AY-style PSG squares: Sunsoft 5B and the SSG part of the EPSM.
//!
//! Tone period and volume belong to each channel. The mixer, noise period and
//! hardware envelope are one set of registers per chip: every sibling channel
//! contributes into a [`PsgSharedState`] during its update, and the channel set
//! commits the result once after the last sibling ran.

use bitflags::bitflags;
use tracing::trace;

use crate::bus::RegisterWriter;
use crate::channel::ChannelState;
use crate::channel_type::Chip;
use crate::envelope::EnvelopeKind;

const REG_NOISE: u8 = 6;
const REG_MIXER: u8 = 7;
const REG_VOLUME: u8 = 8;
const REG_ENV_LO: u8 = 11;
const REG_ENV_HI: u8 = 12;
const REG_ENV_SHAPE: u8 = 13;

/// Volume register value selecting the hardware envelope.
const ENVELOPE_MODE: u8 = 0x10;

bitflags! {
    /// Mixer control register (R7), active low
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MixerFlags: u8 {
        /// Channel A tone disable
        const CH_A_TONE = 0x01;
        /// Channel B tone disable
        const CH_B_TONE = 0x02;
        /// Channel C tone disable
        const CH_C_TONE = 0x04;
        /// Channel A noise disable
        const CH_A_NOISE = 0x08;
        /// Channel B noise disable
        const CH_B_NOISE = 0x10;
        /// Channel C noise disable
        const CH_C_NOISE = 0x20;
    }
}

impl MixerFlags {
    /// Tone disable bit of channel `index`.
    pub fn tone_disable(index: u8) -> Self {
        MixerFlags::from_bits_truncate(1 << index)
    }

    /// Noise disable bit of channel `index`.
    pub fn noise_disable(index: u8) -> Self {
        MixerFlags::from_bits_truncate(1 << (index + 3))
    }

    /// Tone of channel `index` audible.
    pub fn is_tone_enabled(&self, index: u8) -> bool {
        !self.contains(Self::tone_disable(index))
    }

    /// Noise of channel `index` audible.
    pub fn is_noise_enabled(&self, index: u8) -> bool {
        !self.contains(Self::noise_disable(index))
    }
}

/// Address/data port pair of a PSG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsgPorts {
    /// Register select port.
    pub address: u16,
    /// Data port.
    pub data: u16,
}

impl PsgPorts {
    /// Sunsoft 5B.
    pub const S5B: PsgPorts = PsgPorts {
        address: 0xC000,
        data: 0xE000,
    };
    /// EPSM port 0, shared by the SSG and the first three FM channels.
    pub const EPSM: PsgPorts = PsgPorts {
        address: 0x401C,
        data: 0x401D,
    };

    /// Ports of the PSG inside `chip`.
    pub fn for_chip(chip: Chip) -> PsgPorts {
        if chip == Chip::Epsm {
            Self::EPSM
        } else {
            Self::S5B
        }
    }

    /// Select `register` and write `value`.
    pub fn write(&self, w: &mut RegisterWriter, register: u8, value: u8) {
        w.write(self.address, register);
        w.write(self.data, value);
    }
}

/// Source of an envelope period contribution; higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnvPeriodSource {
    /// Instrument's manual period.
    Manual,
    /// Derived from the note period.
    AutoPitch,
    /// Note effect.
    Effect,
}

/// Registers shared by the three squares of one PSG.
#[derive(Debug, Clone, Default)]
pub struct PsgSharedState {
    mixer: MixerFlags,
    noise_period: Option<u8>,
    env_period: Option<(EnvPeriodSource, u16)>,
    env_shape: Option<u8>,
    env_reset: bool,
    written_mixer: Option<u8>,
    written_noise: Option<u8>,
    written_env_period: Option<u16>,
    written_shape: Option<u8>,
}

impl PsgSharedState {
    /// Fresh state; the first commit writes everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Silence the tone of channel `index` this frame.
    pub fn disable_tone(&mut self, index: u8) {
        self.mixer |= MixerFlags::tone_disable(index);
    }

    /// Silence the noise of channel `index` this frame.
    pub fn disable_noise(&mut self, index: u8) {
        self.mixer |= MixerFlags::noise_disable(index);
    }

    /// Noise period; the last contributor wins.
    pub fn set_noise_period(&mut self, period: u8) {
        self.noise_period = Some(period & 0x1F);
    }

    /// Envelope period, kept if an earlier channel gave a higher priority one.
    pub fn set_env_period(&mut self, source: EnvPeriodSource, period: u16) {
        if self.env_period.map_or(true, |(prev, _)| source >= prev) {
            self.env_period = Some((source, period));
        }
    }

    /// Envelope shape.
    pub fn set_env_shape(&mut self, shape: u8) {
        self.env_shape = Some(shape & 0x0F);
    }

    /// Restart the envelope by rewriting the shape register.
    pub fn request_env_reset(&mut self) {
        self.env_reset = true;
    }

    /// Mixer value accumulated this frame.
    pub fn mixer(&self) -> MixerFlags {
        self.mixer
    }

    /// Envelope period accumulated this frame.
    pub fn env_period(&self) -> Option<u16> {
        self.env_period.map(|(_, period)| period)
    }

    /// Write the accumulated registers that changed, then start a new frame.
    pub fn commit(&mut self, ports: PsgPorts, w: &mut RegisterWriter) {
        let mixer = self.mixer.bits();
        if self.written_mixer != Some(mixer) {
            ports.write(w, REG_MIXER, mixer);
            self.written_mixer = Some(mixer);
        }

        if let Some(noise) = self.noise_period {
            if self.written_noise != Some(noise) {
                ports.write(w, REG_NOISE, noise);
                self.written_noise = Some(noise);
            }
        }

        if let Some((_, period)) = self.env_period {
            if self.written_env_period != Some(period) {
                ports.write(w, REG_ENV_LO, (period & 0xFF) as u8);
                ports.write(w, REG_ENV_HI, (period >> 8) as u8);
                self.written_env_period = Some(period);
            }
        }

        if let Some(shape) = self.env_shape {
            if self.env_reset || self.written_shape != Some(shape) {
                trace!(shape, reset = self.env_reset, "PSG envelope shape");
                ports.write(w, REG_ENV_SHAPE, shape);
                self.written_shape = Some(shape);
            }
        }

        self.mixer = MixerFlags::empty();
        self.noise_period = None;
        self.env_period = None;
        self.env_shape = None;
        self.env_reset = false;
    }
}

/// Envelope period following the note, shifted by `octave`.
pub fn auto_pitch_period(period: u16, octave: i8) -> u16 {
    let period = period as u32;
    let shifted = match octave.clamp(-8, 8) {
        o if o > 0 => {
            let shift = o as u32;
            (period + (1 << (shift - 1))) >> shift
        }
        o if o < 0 => period << o.unsigned_abs(),
        _ => period,
    };
    shifted.min(0xFFFF) as u16
}

/// Square channel of a 5B or EPSM SSG.
#[derive(Debug, Clone)]
pub struct PsgSquare {
    index: u8,
    ports: PsgPorts,
}

impl PsgSquare {
    /// Square `index` (0..=2) of the PSG inside `chip`.
    pub fn new(chip: Chip, index: u8) -> Self {
        Self {
            index,
            ports: PsgPorts::for_chip(chip),
        }
    }

    /// Port pair this square writes to.
    pub fn ports(&self) -> PsgPorts {
        self.ports
    }

    pub(crate) fn update_apu(
        &mut self,
        state: &mut ChannelState,
        w: &mut RegisterWriter,
        shared: &mut PsgSharedState,
    ) {
        let i = self.index;

        if !state.note().is_musical() {
            self.ports.write(w, REG_VOLUME + i, 0);
            shared.disable_tone(i);
            shared.disable_noise(i);
            return;
        }

        let period = state.period();
        self.ports.write(w, 2 * i, (period & 0xFF) as u8);
        self.ports.write(w, 2 * i + 1, ((period >> 8) & 0x0F) as u8);

        let mixer = state.envelope_value(EnvelopeKind::YmMixerSettings);
        if mixer & 0x01 == 0 {
            shared.disable_tone(i);
        }
        if mixer & 0x02 == 0 {
            shared.disable_noise(i);
        } else {
            let noise = state.envelope_value(EnvelopeKind::YmNoiseFreq);
            shared.set_noise_period(noise.clamp(0, 0x1F) as u8);
        }

        let env = state
            .instrument()
            .and_then(|inst| inst.psg_envelope())
            .copied()
            .unwrap_or_default();
        let volume = state.volume();

        if env.is_enabled() && volume > 0 {
            self.ports.write(w, REG_VOLUME + i, ENVELOPE_MODE);
        } else {
            self.ports.write(w, REG_VOLUME + i, volume);
        }

        if !env.is_enabled() {
            return;
        }
        shared.set_env_shape(env.shape);
        if state.attack_pending() {
            shared.request_env_reset();
        }
        if let Some(period) = state.effects().env_period {
            shared.set_env_period(EnvPeriodSource::Effect, period);
        } else if env.auto_pitch {
            shared.set_env_period(
                EnvPeriodSource::AutoPitch,
                auto_pitch_period(period, env.auto_pitch_octave),
            );
        } else {
            shared.set_env_period(EnvPeriodSource::Manual, env.period);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RegisterLog;

    #[test]
    fn mixer_bits_are_active_low() {
        let flags = MixerFlags::tone_disable(1) | MixerFlags::noise_disable(2);
        assert_eq!(flags.bits(), 0x22);
        assert!(flags.is_tone_enabled(0));
        assert!(!flags.is_tone_enabled(1));
        assert!(!flags.is_noise_enabled(2));
    }

    #[test]
    fn auto_pitch_rounds_right_shifts() {
        assert_eq!(auto_pitch_period(0x1FF, 0), 0x1FF);
        assert_eq!(auto_pitch_period(5, 1), 3);
        assert_eq!(auto_pitch_period(0x100, 4), 0x10);
        assert_eq!(auto_pitch_period(0x10, -2), 0x40);
        assert_eq!(auto_pitch_period(0xFFFF, -8), 0xFFFF);
    }

    #[test]
    fn env_period_priority() {
        let mut shared = PsgSharedState::new();
        shared.set_env_period(EnvPeriodSource::Effect, 10);
        shared.set_env_period(EnvPeriodSource::Manual, 20);
        assert_eq!(shared.env_period(), Some(10));
        shared.set_env_period(EnvPeriodSource::Effect, 30);
        assert_eq!(shared.env_period(), Some(30));
    }

    #[test]
    fn commit_writes_only_changes() {
        let mut log = RegisterLog::new();
        let mut shared = PsgSharedState::new();
        {
            let mut w = RegisterWriter::new(&mut log, 0, 4);
            shared.disable_noise(0);
            shared.set_env_shape(8);
            shared.commit(PsgPorts::S5B, &mut w);
            shared.disable_noise(0);
            shared.set_env_shape(8);
            shared.commit(PsgPorts::S5B, &mut w);
        }
        assert_eq!(log.pairs(), vec![(0xC000, 7), (0xE000, 0x08), (0xC000, 13), (0xE000, 8)]);

        {
            let mut w = RegisterWriter::new(&mut log, 0, 4);
            shared.disable_noise(0);
            shared.set_env_shape(8);
            shared.request_env_reset();
            shared.commit(PsgPorts::S5B, &mut w);
        }
        assert_eq!(log.last_value(0xE000), Some(8));
        assert_eq!(log.writes_to(0xC000).count(), 3);
    }
}
