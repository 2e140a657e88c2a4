//! Konami VRC6: two squares and a sawtooth.

use crate::bus::RegisterWriter;
use crate::channel::ChannelState;

/// Channel enable bit of the high period registers.
const ENABLE: u8 = 0x80;

fn period_regs(w: &mut RegisterWriter, base: u16, period: u16) {
    w.write(base + 1, (period & 0xFF) as u8);
    w.write(base + 2, ENABLE | ((period >> 8) & 0x0F) as u8);
}

fn toggle_enable(state: &ChannelState, w: &mut RegisterWriter, base: u16) {
    if state.note().is_musical() {
        let hi = ((state.period() >> 8) & 0x0F) as u8;
        w.write(base + 2, hi);
        w.write(base + 2, ENABLE | hi);
    }
}

/// VRC6 square channel.
#[derive(Debug, Clone)]
pub struct Vrc6Square {
    index: u8,
}

impl Vrc6Square {
    /// Square `index` (0 or 1).
    pub fn new(index: u8) -> Self {
        Self { index }
    }

    fn base(&self) -> u16 {
        0x9000 + 0x1000 * self.index as u16
    }

    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        let base = self.base();
        let duty = (state.duty() & 0x07) << 4;
        if !state.note().is_musical() {
            w.write(base, duty);
            return;
        }
        w.write(base, duty | state.volume());
        period_regs(w, base, state.period());
    }

    pub(crate) fn reset_phase(&mut self, state: &ChannelState, w: &mut RegisterWriter) {
        toggle_enable(state, w, self.base());
    }
}

/// VRC6 sawtooth channel.
#[derive(Debug, Clone, Default)]
pub struct Vrc6Saw;

impl Vrc6Saw {
    const BASE: u16 = 0xB000;

    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        if !state.note().is_musical() {
            w.write(Self::BASE, 0);
            return;
        }
        let master = state
            .instrument()
            .map(|inst| inst.saw_master_volume())
            .unwrap_or_default();
        w.write(Self::BASE, master.scale(state.volume()));
        period_regs(w, Self::BASE, state.period());
    }

    pub(crate) fn reset_phase(&mut self, state: &ChannelState, w: &mut RegisterWriter) {
        toggle_enable(state, w, Self::BASE);
    }
}
