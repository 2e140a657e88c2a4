//! Konami VRC7 FM channels.
//!
//! Every register goes through a select/data pair; the data write is charged
//! the chip's long settle time.

use tracing::trace;

use crate::bus::RegisterWriter;
use crate::channel::ChannelState;
use crate::instrument::Instrument;

/// Register select port.
pub const VRC7_SELECT: u16 = 0x9010;
/// Register data port.
pub const VRC7_DATA: u16 = 0x9030;
/// Cycles charged for a select write.
pub const VRC7_SELECT_CYCLES: u32 = 6;
/// Cycles charged for a data write.
pub const VRC7_DATA_CYCLES: u32 = 42;

const KEY_ON: u8 = 0x10;
const SUSTAIN: u8 = 0x20;

/// Split a frequency word into block and 9-bit F-number.
pub fn encode_frequency(period: u16) -> (u8, u16) {
    let mut fnum = period;
    let mut block = 0u8;
    while fnum >= 0x200 && block < 7 {
        fnum >>= 1;
        block += 1;
    }
    (block, fnum.min(0x1FF))
}

fn write_reg(w: &mut RegisterWriter, reg: u8, value: u8) {
    w.write_cycles(VRC7_SELECT, reg, VRC7_SELECT_CYCLES);
    w.write_cycles(VRC7_DATA, value, VRC7_DATA_CYCLES);
}

/// VRC7 FM channel.
#[derive(Debug, Clone)]
pub struct Vrc7Fm {
    index: u8,
    patch: u8,
    reg20: u8,
}

impl Vrc7Fm {
    /// FM channel `index` (0..=5).
    pub fn new(index: u8) -> Self {
        Self {
            index,
            patch: 1,
            reg20: 0,
        }
    }

    pub(crate) fn load_instrument(&mut self, instrument: &Instrument, w: &mut RegisterWriter) {
        let Some(patch) = instrument.vrc7() else {
            return;
        };
        if patch.is_custom() {
            trace!(channel = self.index, "VRC7 custom patch upload");
            for (reg, &value) in patch.custom.iter().enumerate() {
                write_reg(w, reg as u8, value);
            }
        }
        self.patch = patch.preset;
    }

    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        let ch = self.index;

        if state.note().is_stop() {
            if self.reg20 & (KEY_ON | SUSTAIN) != 0 {
                self.reg20 &= !(KEY_ON | SUSTAIN);
                write_reg(w, 0x20 + ch, self.reg20);
            }
            return;
        }
        if !state.note().is_musical() {
            return;
        }

        let (block, fnum) = encode_frequency(state.period());
        let hi = (block << 1) | ((fnum >> 8) as u8 & 0x01);
        let attenuation = 15 - state.volume();

        write_reg(w, 0x10 + ch, (fnum & 0xFF) as u8);
        write_reg(w, 0x30 + ch, (self.patch << 4) | attenuation);

        let value = if state.is_released() {
            SUSTAIN | hi
        } else {
            if state.attack_pending() && self.reg20 & KEY_ON != 0 {
                write_reg(w, 0x20 + ch, hi);
            }
            KEY_ON | SUSTAIN | hi
        };
        write_reg(w, 0x20 + ch, value);
        self.reg20 = value;
    }

    /// Last value written to the key/octave register.
    pub fn key_register(&self) -> u8 {
        self.reg20
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_encodes_to_block_4() {
        assert_eq!(encode_frequency(4640), (4, 290));
        assert_eq!(encode_frequency(300), (0, 300));
        assert_eq!(encode_frequency(0xFFFF), (7, 0x1FF));
    }
}
