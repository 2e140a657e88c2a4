//! Recording bus.
//!
//! [`RegisterLog`] stores every write it receives, tagged with the frame it
//! happened in, and can dump the stream as CSV for diffing against another
//! player's register dump.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::ApuBus;
use crate::error::Result;
use crate::instrument::Instrument;

/// One recorded register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterWrite {
    /// Frame counter at the time of the write.
    pub frame: u32,
    /// APU instance.
    pub apu: usize,
    /// Register address.
    pub register: u16,
    /// Value written.
    pub value: u8,
    /// Cycle cost.
    pub cycles: u32,
    /// Write metadata.
    pub metadata: u32,
}

/// [`ApuBus`] that records writes.
#[derive(Debug, Clone, Default)]
pub struct RegisterLog {
    writes: Vec<RegisterWrite>,
    frame: u32,
    skipped: u64,
    notifications: u64,
    seeking: bool,
    n163_auto_position: Option<u8>,
}

impl RegisterLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `seeking` from [`ApuBus::is_seeking`].
    pub fn set_seeking(&mut self, seeking: bool) {
        self.seeking = seeking;
    }

    /// Answer N163 auto-position requests with `position`.
    pub fn set_n163_auto_position(&mut self, position: Option<u8>) {
        self.n163_auto_position = position;
    }

    /// Start tagging writes with the next frame number.
    pub fn next_frame(&mut self) {
        self.frame += 1;
    }

    /// Current frame number.
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// All writes in order.
    pub fn writes(&self) -> &[RegisterWrite] {
        &self.writes
    }

    /// Writes of the current frame.
    pub fn frame_writes(&self) -> impl Iterator<Item = &RegisterWrite> {
        let frame = self.frame;
        self.writes.iter().filter(move |w| w.frame == frame)
    }

    /// Writes to one register.
    pub fn writes_to(&self, register: u16) -> impl Iterator<Item = &RegisterWrite> {
        self.writes.iter().filter(move |w| w.register == register)
    }

    /// Last value written to `register`.
    pub fn last_value(&self, register: u16) -> Option<u8> {
        self.writes
            .iter()
            .rev()
            .find(|w| w.register == register)
            .map(|w| w.value)
    }

    /// `(register, value)` pairs in order.
    pub fn pairs(&self) -> Vec<(u16, u8)> {
        self.writes.iter().map(|w| (w.register, w.value)).collect()
    }

    /// Cycles passed through `skip_cycles`.
    pub fn skipped_cycles(&self) -> u64 {
        self.skipped
    }

    /// Cycles charged by writes plus skipped cycles.
    pub fn total_cycles(&self) -> u64 {
        self.skipped + self.writes.iter().map(|w| w.cycles as u64).sum::<u64>()
    }

    /// Notifications received.
    pub fn notifications(&self) -> u64 {
        self.notifications
    }

    /// Forget recorded writes and counters, keeping settings.
    pub fn clear(&mut self) {
        self.writes.clear();
        self.skipped = 0;
        self.notifications = 0;
    }

    /// Write the log as CSV with a header row.
    pub fn write_csv_to<W: Write>(&self, out: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        for write in &self.writes {
            writer.serialize(write)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the log to a CSV file.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv_to(std::io::BufWriter::new(file))
    }
}

impl ApuBus for RegisterLog {
    fn write_register(&mut self, apu: usize, register: u16, value: u8, cycles: u32, metadata: u32) {
        self.writes.push(RegisterWrite {
            frame: self.frame,
            apu,
            register,
            value,
            cycles,
            metadata,
        });
    }

    fn skip_cycles(&mut self, _apu: usize, cycles: u32) {
        self.skipped += cycles as u64;
    }

    fn is_seeking(&self, _apu: usize) -> bool {
        self.seeking
    }

    fn notify_register_write(&mut self, _apu: usize, _register: u16, _value: u8, _metadata: u32) {
        self.notifications += 1;
    }

    fn n163_auto_wave_position(&mut self, _instrument: &Instrument) -> Option<u8> {
        self.n163_auto_position
    }
}
