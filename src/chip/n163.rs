//! Namco 163 wavetable channels.
//!
//! The chip exposes 128 bytes of internal RAM through an address/data pair.
//! Channel registers live at the top of that RAM (`$78` for the first driver
//! channel, going down by 8), wave samples are packed two per byte below them.

use tracing::{debug, trace};

use crate::bus::{RegisterWriter, META_N163_WAVE};
use crate::channel::ChannelState;
use crate::envelope::EnvelopeKind;
use crate::instrument::Instrument;

/// Address register; bit 7 enables auto-increment.
pub const N163_ADDRESS: u16 = 0xF800;
/// Data register.
pub const N163_DATA: u16 = 0x4800;
/// Cost of one wave RAM byte in the upload loop.
pub const N163_WAVE_BYTE_CYCLES: u32 = 18;

const AUTO_INCREMENT: u8 = 0x80;

/// Last wave RAM upload of a channel, kept for register viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct N163Upload {
    /// Start position in samples.
    pub position: u8,
    /// Length in samples.
    pub size: u8,
    /// Channel frame the upload happened on.
    pub frame: u64,
}

fn write_reg(w: &mut RegisterWriter, reg: u8, value: u8) {
    w.write(N163_ADDRESS, reg);
    w.write(N163_DATA, value);
}

/// N163 wavetable channel.
#[derive(Debug, Clone)]
pub struct N163Channel {
    index: u8,
    channel_count: u8,
    wave_position: u8,
    uploaded_wave: Option<usize>,
    last_upload: Option<N163Upload>,
}

impl N163Channel {
    /// Channel `index` out of `channel_count` enabled channels.
    pub fn new(index: u8, channel_count: u8) -> Self {
        Self {
            index,
            channel_count: channel_count.clamp(1, 8),
            wave_position: 0,
            uploaded_wave: None,
            last_upload: None,
        }
    }

    fn base(&self) -> u8 {
        0x78 - 8 * self.index
    }

    pub(crate) fn load_instrument(&mut self, instrument: &Instrument, w: &mut RegisterWriter) {
        let Some(n163) = instrument.n163() else {
            return;
        };
        self.wave_position = n163
            .wave_position()
            .or_else(|| w.n163_auto_wave_position(instrument))
            .unwrap_or(0);
        debug!(
            channel = self.index,
            instrument = instrument.name(),
            position = self.wave_position,
            "N163 wave position"
        );
        write_reg(w, self.base() + 6, self.wave_position);
        self.uploaded_wave = None;
    }

    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        let base = self.base();
        let volume_reg = (self.channel_count - 1) << 4;

        if !state.note().is_musical() {
            write_reg(w, base + 7, volume_reg);
            return;
        }
        let Some(n163) = state.instrument().and_then(|inst| inst.n163()).cloned() else {
            write_reg(w, base + 7, volume_reg);
            return;
        };

        let wave = self.envelope_frame(state).unwrap_or(0);
        if self.uploaded_wave != Some(wave) {
            let bytes = n163.packed_wave(wave);
            trace!(channel = self.index, wave, bytes = bytes.len(), "N163 wave upload");
            w.write(N163_ADDRESS, AUTO_INCREMENT | (self.wave_position / 2));
            for byte in bytes {
                w.write_full(N163_DATA, byte, N163_WAVE_BYTE_CYCLES, META_N163_WAVE);
            }
            self.uploaded_wave = Some(wave);
            self.last_upload = Some(N163Upload {
                position: self.wave_position,
                size: n163.wave_size(),
                frame: state.frame(),
            });
        }

        let size = n163.wave_size() as u32;
        let freq = ((((state.period() as u32) << 2) * size) / 16) & 0x3FFFF;
        let length = ((256 - size) & 0xFC) as u8;

        write_reg(w, base, (freq & 0xFF) as u8);
        write_reg(w, base + 2, ((freq >> 8) & 0xFF) as u8);
        write_reg(w, base + 4, length | ((freq >> 16) & 0x03) as u8);
        write_reg(w, base + 7, volume_reg | state.volume());
    }

    pub(crate) fn reset_phase(&mut self, state: &ChannelState, w: &mut RegisterWriter) {
        if state.note().is_musical() {
            let base = self.base();
            write_reg(w, base + 1, 0);
            write_reg(w, base + 3, 0);
            write_reg(w, base + 5, 0);
        }
    }

    /// Wave index selected by the waveform repeat envelope.
    pub(crate) fn envelope_frame(&self, state: &ChannelState) -> Option<usize> {
        let n163 = state.instrument()?.n163()?;
        let index = state.envelope_value(EnvelopeKind::WaveformRepeat).max(0) as usize;
        Some(index.min(n163.wave_count() - 1))
    }

    /// Wave RAM position in samples.
    pub fn wave_position(&self) -> u8 {
        self.wave_position
    }

    /// Most recent wave upload.
    pub fn last_upload(&self) -> Option<N163Upload> {
        self.last_upload
    }
}
