//! 2A03 channels: squares, triangle, noise and DPCM.

use bitflags::bitflags;
use tracing::{trace, warn};

use crate::bus::{RegisterWriter, META_DPCM_START};
use crate::channel::ChannelState;
use crate::envelope::EnvelopeKind;

/// Frame counter register.
pub const APU_FRAME_COUNTER: u16 = 0x4017;
/// Status / channel enable register.
pub const APU_STATUS: u16 = 0x4015;

bitflags! {
    /// `$4015` channel enable bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ApuStatus: u8 {
        /// Square 1 length counter enable
        const SQUARE_1 = 0x01;
        /// Square 2 length counter enable
        const SQUARE_2 = 0x02;
        /// Triangle length counter enable
        const TRIANGLE = 0x04;
        /// Noise length counter enable
        const NOISE = 0x08;
        /// DMC enable (starts the sample)
        const DMC = 0x10;
    }
}

impl ApuStatus {
    /// Tone channels on, DMC off.
    pub fn tone_only() -> Self {
        ApuStatus::SQUARE_1 | ApuStatus::SQUARE_2 | ApuStatus::TRIANGLE | ApuStatus::NOISE
    }
}

/// Constant-volume and length-halt bits of `$4000`/`$4004`/`$400C`.
const HALT_CONST_VOLUME: u8 = 0x30;

/// 2A03 square channel.
#[derive(Debug, Clone)]
pub struct ApuSquare {
    index: u8,
    last_period_hi: Option<u8>,
}

impl ApuSquare {
    /// Square `index` (0 or 1).
    pub fn new(index: u8) -> Self {
        Self {
            index,
            last_period_hi: None,
        }
    }

    fn base(&self) -> u16 {
        0x4000 + 4 * self.index as u16
    }

    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        let base = self.base();
        let duty = (state.duty() & 0x03) << 6;

        if state.note().is_stop() || !state.note().is_musical() {
            w.write(base, duty | HALT_CONST_VOLUME);
            self.last_period_hi = None;
            return;
        }

        let period = state.period();
        let lo = (period & 0xFF) as u8;
        let hi = ((period >> 8) & 0x07) as u8;

        w.write(base, duty | HALT_CONST_VOLUME | state.volume());

        let smooth = state.config().smooth_vibrato && !w.is_seeking();
        match self.last_period_hi {
            Some(prev) if prev == hi => w.write(base + 2, lo),
            Some(prev) if smooth && (hi as i16 - prev as i16).abs() == 1 => {
                self.sweep_to(w, hi > prev);
                w.write(base + 2, lo);
            }
            _ => {
                w.write(base + 2, lo);
                w.write(base + 3, hi);
            }
        }
        self.last_period_hi = Some(hi);
    }

    /// Move the high period bits by one using the sweep unit, without the
    /// phase reset a `$4003` write causes.
    fn sweep_to(&self, w: &mut RegisterWriter, up: bool) {
        let base = self.base();
        trace!(square = self.index, up, "sweep period carry");
        w.write(APU_FRAME_COUNTER, 0x40);
        if up {
            w.write(base + 2, 0xFF);
            w.write(base + 1, 0x87);
        } else {
            w.write(base + 2, 0x00);
            w.write(base + 1, 0x8F);
        }
        w.write(APU_FRAME_COUNTER, 0xC0);
        w.write(base + 1, 0x08);
    }

    pub(crate) fn reset_phase(&mut self, state: &ChannelState, w: &mut RegisterWriter) {
        if state.note().is_musical() {
            let hi = ((state.period() >> 8) & 0x07) as u8;
            w.write(self.base() + 3, hi);
            self.last_period_hi = Some(hi);
        }
    }
}

/// 2A03 triangle channel.
#[derive(Debug, Clone, Default)]
pub struct ApuTriangle;

impl ApuTriangle {
    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        if state.note().is_stop() || !state.note().is_musical() {
            w.write(0x4008, 0x80);
            return;
        }
        let period = state.period();
        w.write(0x400A, (period & 0xFF) as u8);
        w.write(0x400B, ((period >> 8) & 0x07) as u8);
        let audible = state.envelope_value(EnvelopeKind::Volume) != 0;
        w.write(0x4008, if audible { 0xFF } else { 0x80 });
    }
}

/// 2A03 noise channel.
#[derive(Debug, Clone, Default)]
pub struct ApuNoise;

impl ApuNoise {
    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        if state.note().is_stop() || !state.note().is_musical() {
            w.write(0x400C, HALT_CONST_VOLUME);
            return;
        }
        let period = ((state.period() & 0x0F) ^ 0x0F) as u8;
        let mode = (state.duty() & 0x01) << 7;
        w.write(0x400C, HALT_CONST_VOLUME | state.volume());
        w.write(0x400E, mode | period);
    }
}

/// 2A03 delta modulation channel.
#[derive(Debug, Clone, Default)]
pub struct ApuDpcm {
    stopped: bool,
}

impl ApuDpcm {
    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        if state.note().is_stop() {
            if !self.stopped {
                w.write(APU_STATUS, ApuStatus::tone_only().bits());
                self.stopped = true;
            }
            return;
        }

        if !state.attack_pending() {
            if let Some(value) = state.take_delta_counter() {
                w.write(0x4011, value & 0x7F);
            }
            return;
        }

        let effect = state.take_delta_counter();
        let Some(note) = state.note().musical_value() else {
            return;
        };
        let Some(mapping) = state
            .instrument()
            .and_then(|inst| inst.dpcm_mapping(note))
            .cloned()
        else {
            warn!(note, "no DPCM mapping for note");
            return;
        };
        let initial = effect
            .or(mapping.dmc_initial)
            .unwrap_or_else(|| mapping.sample.dmc_initial());

        trace!(sample = mapping.sample.name(), pitch = mapping.pitch, initial, "DMC start");
        let cycles = w.default_write_cycles();
        w.write_full(APU_STATUS, ApuStatus::tone_only().bits(), cycles, META_DPCM_START);
        w.write(0x4012, mapping.sample.address_register());
        w.write(0x4013, mapping.sample.length_register());
        w.write(0x4010, mapping.rate_register());
        w.write(0x4011, initial & 0x7F);
        w.write(APU_STATUS, ApuStatus::all().bits());
        self.stopped = false;
    }
}
