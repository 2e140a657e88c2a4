//! Per-frame CPU cycle accounting.
//!
//! Counts the cycles charged by register writes and explicit skips so a
//! caller can check how much of the frame budget a channel update used.

/// Cycle counter for one register writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleCounter {
    cycles: u64,
    writes: u32,
}

impl CycleCounter {
    /// Create a zeroed counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge one register write costing `cycles`
    pub fn charge_write(&mut self, cycles: u32) {
        self.cycles += cycles as u64;
        self.writes += 1;
    }

    /// Charge idle cycles
    pub fn advance(&mut self, cycles: u32) {
        self.cycles += cycles as u64;
    }

    /// Cycles charged so far
    pub fn get_cycles(&self) -> u64 {
        self.cycles
    }

    /// Register writes charged so far
    pub fn get_writes(&self) -> u32 {
        self.writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_counter() {
        let mut counter = CycleCounter::new();
        assert_eq!(counter.get_cycles(), 0);

        counter.charge_write(4);
        assert_eq!(counter.get_cycles(), 4);
        assert_eq!(counter.get_writes(), 1);

        counter.advance(96);
        assert_eq!(counter.get_cycles(), 100);
        assert_eq!(counter.get_writes(), 1);
    }
}
