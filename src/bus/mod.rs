//! Register bus abstraction.
//!
//! Channels never talk to a chip emulator directly. Every write goes through a
//! [`RegisterWriter`], which forwards it to the caller's [`ApuBus`], fires the
//! diagnostic notification and keeps the cycle accounting in one place.

pub mod cycle_counter;
pub mod register_log;

pub use cycle_counter::CycleCounter;
pub use register_log::{RegisterLog, RegisterWrite};

use crate::instrument::Instrument;

/// Metadata attached to ordinary writes.
pub const META_NONE: u32 = 0;
/// Metadata attached to N163 wave RAM upload bytes.
pub const META_N163_WAVE: u32 = 1;
/// Metadata attached to the DMC start sequence.
pub const META_DPCM_START: u32 = 2;

/// Backend receiving register writes.
///
/// `apu` identifies the APU instance when several are emulated side by side
/// (the caller's channel set index).
pub trait ApuBus {
    /// Write `value` to `register`, costing `cycles` CPU cycles.
    fn write_register(&mut self, apu: usize, register: u16, value: u8, cycles: u32, metadata: u32);

    /// Let `cycles` CPU cycles pass without writing.
    fn skip_cycles(&mut self, apu: usize, cycles: u32);

    /// True while the player fast-forwards to a position.
    fn is_seeking(&self, _apu: usize) -> bool {
        false
    }

    /// Diagnostic hook fired after every write.
    fn notify_register_write(&mut self, _apu: usize, _register: u16, _value: u8, _metadata: u32) {}

    /// Wave RAM position for an N163 instrument without a fixed position.
    fn n163_auto_wave_position(&mut self, _instrument: &Instrument) -> Option<u8> {
        None
    }
}

/// Write front-end bound to one APU instance for one update.
pub struct RegisterWriter<'a> {
    bus: &'a mut dyn ApuBus,
    apu: usize,
    write_cycles: u32,
    counter: CycleCounter,
}

impl<'a> RegisterWriter<'a> {
    /// Wrap `bus`, charging `write_cycles` for plain writes.
    pub fn new(bus: &'a mut dyn ApuBus, apu: usize, write_cycles: u32) -> Self {
        Self {
            bus,
            apu,
            write_cycles,
            counter: CycleCounter::new(),
        }
    }

    /// Plain write.
    pub fn write(&mut self, register: u16, value: u8) {
        self.write_full(register, value, self.write_cycles, META_NONE);
    }

    /// Write with an explicit cycle cost.
    pub fn write_cycles(&mut self, register: u16, value: u8, cycles: u32) {
        self.write_full(register, value, cycles, META_NONE);
    }

    /// Write with cost and metadata.
    pub fn write_full(&mut self, register: u16, value: u8, cycles: u32, metadata: u32) {
        self.bus
            .write_register(self.apu, register, value, cycles, metadata);
        self.bus
            .notify_register_write(self.apu, register, value, metadata);
        self.counter.charge_write(cycles);
    }

    /// Idle for `cycles`.
    pub fn skip(&mut self, cycles: u32) {
        if cycles == 0 {
            return;
        }
        self.bus.skip_cycles(self.apu, cycles);
        self.counter.advance(cycles);
    }

    /// Forwarded seek state.
    pub fn is_seeking(&self) -> bool {
        self.bus.is_seeking(self.apu)
    }

    /// Forwarded N163 wave allocation.
    pub fn n163_auto_wave_position(&mut self, instrument: &Instrument) -> Option<u8> {
        self.bus.n163_auto_wave_position(instrument)
    }

    /// Cycles charged through this writer.
    pub fn cycles(&self) -> u64 {
        self.counter.get_cycles()
    }

    /// Writes issued through this writer.
    pub fn writes(&self) -> u32 {
        self.counter.get_writes()
    }

    /// Default cost of a plain write.
    pub fn default_write_cycles(&self) -> u32 {
        self.write_cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_forwards_and_counts() {
        let mut log = RegisterLog::new();
        {
            let mut w = RegisterWriter::new(&mut log, 0, 4);
            w.write(0x4000, 0x3F);
            w.write_cycles(0x9030, 0x10, 42);
            w.skip(10);
            w.skip(0);
            assert_eq!(w.cycles(), 56);
            assert_eq!(w.writes(), 2);
        }
        assert_eq!(log.writes().len(), 2);
        assert_eq!(log.writes()[1].cycles, 42);
        assert_eq!(log.skipped_cycles(), 10);
        assert_eq!(log.notifications(), 2);
    }
}
