//! Per-channel sound driver for the NES APU and its expansion chips
//!
//! Turns tracker notes (notes, effects, envelopes) into ordered, cycle-costed
//! register writes for the 2A03 and the MMC5, VRC6, VRC7, FDS, N163, Sunsoft 5B
//! and EPSM expansions. The driver never synthesizes audio: writes go to an
//! [`ApuBus`] supplied by the caller, typically a chip emulator.
//!
//! # Features
//!
//! - Envelope slots with loop and release points, waveform-repeat holding
//! - Slides, volume slides, vibrato, arpeggios, note delays and cuts
//! - Delayed release / duration scheduling against a [`SongSource`]
//! - Chip quirks: square sweep carry, DPCM start sequence, N163 wave uploads,
//!   VRC7/EPSM key handling, shared PSG mixer and envelope registers
//! - [`RegisterLog`] bus with CSV export for diagnostics and tests
//!
//! # Quick Start
//!
//! ```no_run
//! use nes_apu_driver::{
//!     ChannelSet, ChannelType, Chip, DriverConfig, Instrument, Note, RegisterLog,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut set = ChannelSet::new(0, &[Chip::Vrc6], DriverConfig::default())?;
//! let mut bus = RegisterLog::new();
//!
//! let lead = Instrument::apu("lead").shared();
//! set.play_note(&mut bus, ChannelType::Square(0), Note::musical(49).with_instrument(lead));
//! set.update(&mut bus);
//!
//! for write in bus.writes() {
//!     println!("${:04X} <- ${:02X}", write.register, write.value);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod bus;
pub mod channel;
pub mod channel_set;
pub mod channel_type;
pub mod chip;
pub mod config;
pub mod envelope;
pub mod error;
pub mod instrument;
pub mod note;
pub mod note_table;
pub mod song;

pub use bus::{ApuBus, RegisterLog, RegisterWrite, RegisterWriter};
pub use channel::{Channel, ChannelState, PendingNote};
pub use channel_set::{channel_layout, ChannelSet};
pub use channel_type::{ChannelType, Chip};
pub use chip::{ChipChannel, SharedRegisters};
pub use config::{DriverConfig, Machine, PlayerMode};
pub use envelope::{Envelope, EnvelopeCursor, EnvelopeKind};
pub use error::{DriverError, Result};
pub use instrument::{Arpeggio, DpcmMapping, DpcmSample, Instrument, InstrumentKind};
pub use note::{Note, NoteValue, Vibrato};
pub use note_table::ChannelTuning;
pub use song::{LinearSong, NoteLocation, SongSource};
