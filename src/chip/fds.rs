//! Famicom Disk System wavetable channel.

use tracing::trace;

use crate::bus::RegisterWriter;
use crate::channel::ChannelState;
use crate::instrument::Instrument;

const VOLUME: u16 = 0x4080;
const FREQ_LO: u16 = 0x4082;
const FREQ_HI: u16 = 0x4083;
const MOD_DEPTH: u16 = 0x4084;
const MOD_SPEED_LO: u16 = 0x4086;
const MOD_SPEED_HI: u16 = 0x4087;
const MOD_TABLE: u16 = 0x4088;
const MASTER: u16 = 0x4089;
const WAVE_RAM: u16 = 0x4040;

/// Direct volume mode bit of `$4080` and `$4084`.
const DIRECT: u8 = 0x80;

/// FDS channel.
#[derive(Debug, Clone, Default)]
pub struct FdsChannel {
    mod_delay_counter: u8,
}

impl FdsChannel {
    pub(crate) fn load_instrument(&mut self, instrument: &Instrument, w: &mut RegisterWriter) {
        let Some(fds) = instrument.fds() else {
            return;
        };
        trace!(instrument = instrument.name(), "FDS wave upload");

        w.write(MASTER, 0x80);
        for (i, &sample) in fds.wave().iter().enumerate() {
            w.write(WAVE_RAM + i as u16, sample);
        }
        w.write(MASTER, fds.master_volume & 0x03);

        w.write(MOD_SPEED_HI, 0x80);
        for &entry in fds.mod_table() {
            w.write(MOD_TABLE, entry);
        }
    }

    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        if !state.note().is_musical() {
            w.write(VOLUME, DIRECT);
            return;
        }

        let fds = state.instrument().and_then(|inst| inst.fds()).cloned();
        if state.attack_pending() {
            self.mod_delay_counter = fds.as_ref().map_or(0, |f| f.mod_delay);
        }

        let period = state.period();
        let volume = state.volume() as u16;
        w.write(VOLUME, DIRECT | ((volume * 32 + 7) / 15) as u8);
        w.write(FREQ_LO, (period & 0xFF) as u8);
        w.write(FREQ_HI, ((period >> 8) & 0x0F) as u8);

        if self.mod_delay_counter > 0 {
            w.write(MOD_SPEED_HI, 0x80);
            return;
        }

        let effects = state.effects();
        let depth = effects
            .fds_mod_depth
            .or_else(|| fds.as_ref().map(|f| f.mod_depth))
            .unwrap_or(0);
        let speed = effects
            .fds_mod_speed
            .or_else(|| fds.as_ref().map(|f| f.mod_speed))
            .unwrap_or(0);
        w.write(MOD_DEPTH, DIRECT | (depth & 0x3F));
        w.write(MOD_SPEED_LO, (speed & 0xFF) as u8);
        w.write(MOD_SPEED_HI, ((speed >> 8) & 0x0F) as u8);
    }

    pub(crate) fn post_update(&mut self) {
        self.mod_delay_counter = self.mod_delay_counter.saturating_sub(1);
    }

    /// Frames of modulation hold-off left.
    pub fn mod_delay_counter(&self) -> u8 {
        self.mod_delay_counter
    }
}
