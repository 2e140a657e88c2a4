//! MMC5 squares.
//!
//! Same layout as the 2A03 squares at `$5000`, without a sweep unit.

use crate::bus::RegisterWriter;
use crate::channel::ChannelState;

/// MMC5 square channel.
#[derive(Debug, Clone)]
pub struct Mmc5Square {
    index: u8,
    last_period_hi: Option<u8>,
}

impl Mmc5Square {
    /// Square `index` (0 or 1).
    pub fn new(index: u8) -> Self {
        Self {
            index,
            last_period_hi: None,
        }
    }

    pub(crate) fn update_apu(&mut self, state: &mut ChannelState, w: &mut RegisterWriter) {
        let base = 0x5000 + 4 * self.index as u16;
        let duty = (state.duty() & 0x03) << 6;

        if !state.note().is_musical() {
            w.write(base, duty | 0x30);
            self.last_period_hi = None;
            return;
        }

        let period = state.period();
        let hi = ((period >> 8) & 0x07) as u8;
        w.write(base, duty | 0x30 | state.volume());
        w.write(base + 2, (period & 0xFF) as u8);
        if self.last_period_hi != Some(hi) {
            w.write(base + 3, hi);
            self.last_period_hi = Some(hi);
        }
    }
}
