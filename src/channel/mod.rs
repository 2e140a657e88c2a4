//! Channels: generic state plus a chip driver.
//!
//! A [`Channel`] pairs the chip-agnostic [`ChannelState`] with the
//! [`ChipChannel`] that turns it into register writes, and runs the per-row
//! and per-frame pipelines over both.

pub mod effects;
mod slot;
mod state;

pub use effects::{PitchSlide, SlideParams, VolumeSlide};
pub use slot::EnvelopeSlot;
pub use state::{multiply_volume, ChannelState, PendingNote, StickyEffects};

use tracing::trace;

use crate::bus::RegisterWriter;
use crate::channel_type::ChannelType;
use crate::chip::{ChipChannel, SharedRegisters};
use crate::config::DriverConfig;
use crate::note::Note;
use crate::note_table::ChannelTuning;
use crate::song::{NoteLocation, SongSource};

/// One sound channel.
#[derive(Debug, Clone)]
pub struct Channel {
    state: ChannelState,
    chip: ChipChannel,
}

impl Channel {
    /// Channel of `channel_type` with the note table `config` implies.
    pub fn new(channel_type: ChannelType, config: &DriverConfig) -> Self {
        let tuning = ChannelTuning::for_channel(channel_type, config);
        Self::with_tuning(channel_type, tuning, config)
    }

    /// Channel with a caller-supplied tuning.
    pub fn with_tuning(
        channel_type: ChannelType,
        tuning: ChannelTuning,
        config: &DriverConfig,
    ) -> Self {
        Self {
            state: ChannelState::new(channel_type, tuning, config.clone()),
            chip: ChipChannel::new(channel_type, config),
        }
    }

    /// Process the row at `location`. Call once per row, before `update`.
    pub fn advance(
        &mut self,
        song: &dyn SongSource,
        location: NoteLocation,
        speed: &mut u8,
        w: &mut RegisterWriter,
    ) {
        if let Some(late) = self.state.take_delayed_note() {
            trace!(channel = %self.state.channel_type(), "delayed note forced by next row");
            self.play_note(late, w);
        }
        if let Some(pending) = self.state.schedule_row(song, location, speed) {
            self.play_note(pending, w);
        }
    }

    /// Play `pending` now, loading chip instrument data when it changed.
    pub fn play_note(&mut self, pending: PendingNote, w: &mut RegisterWriter) {
        if let Some(instrument) = self.state.play_note(pending) {
            self.chip.load_instrument(&instrument, w);
        }
    }

    /// Run one frame and emit its registers.
    pub fn update(&mut self, w: &mut RegisterWriter, shared: &mut SharedRegisters) {
        if let Some(pending) = self.state.tick_delayed_note() {
            self.play_note(pending, w);
        }
        if self.state.tick_cut() {
            self.play_note(PendingNote::plain(Note::stop()), w);
        }

        self.state.update_envelopes();
        self.state.update_slide();
        self.state.update_volume_slide();

        self.chip.update_apu(&mut self.state, w, shared);
        if self.state.phase_reset_pending() {
            self.chip.reset_phase(&self.state, w);
        }

        self.chip.post_update();
        self.state.post_update();
    }

    /// Forget everything played so far.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Channel type.
    pub fn channel_type(&self) -> ChannelType {
        self.state.channel_type()
    }

    /// Generic state.
    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    /// Chip driver.
    pub fn chip(&self) -> &ChipChannel {
        &self.chip
    }
}
