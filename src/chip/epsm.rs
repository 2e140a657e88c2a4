//! EPSM (YM2608) FM and rhythm channels.
//!
//! The SSG squares of the EPSM are driven by [`super::psg::PsgSquare`].

use tracing::{debug, trace};

use crate::bus::RegisterWriter;
use crate::channel::ChannelState;
use crate::instrument::{EpsmPatch, Instrument, EPSM_OPERATOR_REGS};

/// Key on/off register, always on port 0.
const REG_KEY: u8 = 0x28;
/// Rhythm key register.
const REG_RHYTHM_KEY: u8 = 0x10;
/// Rhythm instrument level/pan base.
const REG_RHYTHM_LEVEL: u8 = 0x18;
/// Both speakers for rhythm level registers.
const RHYTHM_PAN: u8 = 0xC0;
/// Rhythm dump bit.
const RHYTHM_DUMP: u8 = 0x80;
/// All four operator slots for `$28`.
const ALL_SLOTS: u8 = 0xF0;

/// Cycles left between key-off and key-on on attack.
pub const EPSM_KEY_GAP_CYCLES: u32 = 32;

/// Attenuation added to carrier total levels, indexed by channel volume.
pub const EPSM_VOLUME_ATTENUATION: [u8; 16] =
    [127, 31, 23, 19, 15, 13, 11, 9, 7, 6, 5, 4, 3, 2, 1, 0];

/// Register offset of operators 1 to 4.
const OPERATOR_OFFSETS: [u8; 4] = [0, 8, 4, 12];

/// Operators whose output reaches the DAC, bit 0 = operator 1.
pub fn carrier_mask(algorithm: u8) -> u8 {
    match algorithm & 0x07 {
        0..=3 => 0x08,
        4 => 0x0A,
        5 | 6 => 0x0E,
        _ => 0x0F,
    }
}

/// Select `register` on `port` (0 or 1) and write `value`.
fn write_port(w: &mut RegisterWriter, port: u8, register: u8, value: u8) {
    let address = 0x401C + 2 * port as u16;
    w.write(address, register);
    w.write(address + 1, value);
}

/// Split a frequency word into block and 11-bit F-number.
pub fn encode_frequency(period: u16) -> (u8, u16) {
    let mut fnum = period;
    let mut block = 2u8;
    while fnum >= 0x800 && block < 7 {
        fnum >>= 1;
        block += 1;
    }
    (block, fnum.min(0x7FF))
}

/// EPSM FM channel.
#[derive(Debug, Clone)]
pub struct EpsmFm {
    index: u8,
    patch: Option<EpsmPatch>,
    pending_patch: Option<EpsmPatch>,
    key_on: bool,
}

impl EpsmFm {
    /// FM channel `index` (0..=5).
    pub fn new(index: u8) -> Self {
        Self {
            index,
            patch: None,
            pending_patch: None,
            key_on: false,
        }
    }

    fn port(&self) -> u8 {
        self.index / 3
    }

    fn ch(&self) -> u8 {
        self.index % 3
    }

    /// Channel select bits of `$28`.
    fn key_select(&self) -> u8 {
        self.ch() | (self.port() << 2)
    }

    pub(crate) fn load_instrument(&mut self, instrument: &Instrument) {
        if let Some(epsm) = instrument.epsm() {
            debug!(channel = self.index, instrument = instrument.name(), "EPSM patch queued");
            self.pending_patch = Some(epsm.patch);
        }
    }

    /// True while a loaded patch waits for the next update.
    pub fn has_pending_patch(&self) -> bool {
        self.pending_patch.is_some()
    }

    fn write_patch(&self, patch: &EpsmPatch, w: &mut RegisterWriter) {
        let (port, ch) = (self.port(), self.ch());
        trace!(channel = self.index, "EPSM patch write");
        write_port(w, port, 0xB0 + ch, patch.feedback_algorithm());
        write_port(w, port, 0xB4 + ch, patch.pan_lfo());
        for (op, &offset) in OPERATOR_OFFSETS.iter().enumerate() {
            for (reg_index, &base) in EPSM_OPERATOR_REGS.iter().enumerate() {
                write_port(w, port, base + offset + ch, patch.operator_reg(op, reg_index));
            }
        }
        write_port(w, 0, 0x22, patch.lfo());
    }

    fn key_off(&mut self, w: &mut RegisterWriter) {
        write_port(w, 0, REG_KEY, self.key_select());
        self.key_on = false;
    }

    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        if let Some(patch) = self.pending_patch.take() {
            self.write_patch(&patch, w);
            self.patch = Some(patch);
        }

        if !state.note().is_musical() {
            if self.key_on {
                self.key_off(w);
            }
            return;
        }

        let (port, ch) = (self.port(), self.ch());
        let (block, fnum) = encode_frequency(state.period());
        write_port(w, port, 0xA4 + ch, (block << 3) | (fnum >> 8) as u8);
        write_port(w, port, 0xA0 + ch, (fnum & 0xFF) as u8);

        if let Some(patch) = &self.patch {
            let mask = carrier_mask(patch.algorithm());
            let attenuation = EPSM_VOLUME_ATTENUATION[state.volume() as usize & 0x0F];
            for (op, &offset) in OPERATOR_OFFSETS.iter().enumerate() {
                if mask & (1 << op) == 0 {
                    continue;
                }
                let level = (patch.total_level(op) as u16 + attenuation as u16).min(127) as u8;
                write_port(w, port, 0x40 + offset + ch, level);
            }
        }

        if state.is_released() {
            if self.key_on {
                self.key_off(w);
            }
        } else if state.attack_pending() {
            self.key_off(w);
            w.skip(EPSM_KEY_GAP_CYCLES);
            write_port(w, 0, REG_KEY, ALL_SLOTS | self.key_select());
            self.key_on = true;
        }
    }

    /// Key-on state as last written.
    pub fn is_key_on(&self) -> bool {
        self.key_on
    }
}

/// EPSM rhythm channel (bass drum, snare, top cymbal, hi-hat, tom, rim shot).
#[derive(Debug, Clone)]
pub struct EpsmRhythm {
    index: u8,
    playing: bool,
}

impl EpsmRhythm {
    /// Rhythm instrument `index` (0..=5).
    pub fn new(index: u8) -> Self {
        Self {
            index,
            playing: false,
        }
    }

    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        let bit = 1u8 << self.index;
        if state.note().is_stop() {
            if self.playing {
                write_port(w, 0, REG_RHYTHM_KEY, RHYTHM_DUMP | bit);
                self.playing = false;
            }
            return;
        }
        if !state.note().is_musical() || !state.attack_pending() {
            return;
        }
        let level = (state.volume() as u16 * 31 / 15) as u8;
        write_port(w, 0, REG_RHYTHM_LEVEL + self.index, RHYTHM_PAN | level);
        write_port(w, 0, REG_RHYTHM_KEY, bit);
        self.playing = true;
    }
}
