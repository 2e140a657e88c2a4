//! Chip-agnostic channel state.
//!
//! [`ChannelState`] resolves notes into envelope cursors, slides and volume,
//! and exposes the period/volume/duty helpers chip drivers read when they
//! emit registers. It never touches the bus itself.

use std::sync::Arc;

use tracing::{debug, warn};

use super::effects::{PitchSlide, SlideParams, VolumeSlide};
use super::slot::EnvelopeSlot;
use crate::channel_type::ChannelType;
use crate::config::DriverConfig;
use crate::envelope::{Envelope, EnvelopeCursor, EnvelopeKind};
use crate::instrument::{Arpeggio, Instrument};
use crate::note::{Note, NoteValue};
use crate::note_table::ChannelTuning;
use crate::song::{NoteLocation, SongSource};

/// A note waiting to be played, with the row-dependent slide data it needs.
#[derive(Debug, Clone)]
pub struct PendingNote {
    /// Note to play.
    pub note: Note,
    /// Slide parameters for a slide note.
    pub slide: Option<SlideParams>,
    /// Volume-slide step for a note with a volume slide target.
    pub volume_slide_step: i32,
}

impl PendingNote {
    /// Note without slide data.
    pub fn plain(note: Note) -> Self {
        Self {
            note,
            slide: None,
            volume_slide_step: 0,
        }
    }
}

/// Effects that stick to the channel until replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StickyEffects {
    /// Duty cycle override.
    pub duty: Option<u8>,
    /// 5B/EPSM hardware envelope period.
    pub env_period: Option<u16>,
    /// FDS modulation depth.
    pub fds_mod_depth: Option<u8>,
    /// FDS modulation speed.
    pub fds_mod_speed: Option<u16>,
}

/// Playback state of one channel.
#[derive(Debug, Clone)]
pub struct ChannelState {
    channel_type: ChannelType,
    tuning: ChannelTuning,
    config: DriverConfig,

    note: Note,
    loaded_instrument: Option<Arc<Instrument>>,
    force_reload: bool,
    delayed: Option<PendingNote>,
    delay_counter: u32,
    cut_counter: Option<u32>,
    release_counter: Option<u16>,
    duration_counter: Option<u16>,

    slots: [EnvelopeSlot; EnvelopeKind::COUNT],
    vibrato_override: bool,
    released: bool,

    slide: PitchSlide,
    volume_slide: VolumeSlide,
    effects: StickyEffects,

    attack_pending: bool,
    release_pending: bool,
    phase_reset_pending: bool,
    delta_counter: Option<u8>,
    frame: u64,
}

fn same_arc<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl ChannelState {
    /// Fresh state for `channel_type`.
    pub fn new(channel_type: ChannelType, tuning: ChannelTuning, config: DriverConfig) -> Self {
        Self {
            channel_type,
            tuning,
            config,
            note: Note::default(),
            loaded_instrument: None,
            force_reload: false,
            delayed: None,
            delay_counter: 0,
            cut_counter: None,
            release_counter: None,
            duration_counter: None,
            slots: EnvelopeKind::ALL.map(EnvelopeSlot::new),
            vibrato_override: false,
            released: false,
            slide: PitchSlide::default(),
            volume_slide: VolumeSlide::default(),
            effects: StickyEffects::default(),
            attack_pending: false,
            release_pending: false,
            phase_reset_pending: false,
            delta_counter: None,
            frame: 0,
        }
    }

    /// Forget everything played so far.
    pub fn reset(&mut self) {
        let tuning = self.tuning.clone();
        let config = self.config.clone();
        *self = Self::new(self.channel_type, tuning, config);
        self.force_reload = true;
    }

    // ---- row scheduling -------------------------------------------------

    /// Read the row at `location` and decide what to play.
    ///
    /// Returns the note to play right away; delayed notes are stored and
    /// `None` is returned.
    pub(crate) fn schedule_row(
        &mut self,
        song: &dyn SongSource,
        location: NoteLocation,
        speed: &mut u8,
    ) -> Option<PendingNote> {
        let fire_release = tick_rows(&mut self.release_counter);
        let fire_stop = tick_rows(&mut self.duration_counter);

        let mut note = song.note_at(self.channel_type, location);
        if fire_release || fire_stop {
            let value = if fire_stop {
                NoteValue::Stop
            } else {
                NoteValue::Release
            };
            debug!(channel = %self.channel_type, ?value, "scheduled note fired");
            note = Some(match note {
                Some(n) if !n.is_empty() => n,
                Some(n) => n.with_value(value),
                None => Note::default().with_value(value),
            });
        }
        let note = note?;

        if let Some(s) = note.speed {
            *speed = s;
        }
        if note.is_musical() || note.is_stop() {
            self.release_counter = None;
            self.duration_counter = None;
        }
        if note.is_musical() {
            self.release_counter = self.schedule_after(song, location, note.release);
            self.duration_counter = self.schedule_after(song, location, note.duration);
        }

        let slide = if note.is_slide() {
            let frames = song.frames_until_next_note(self.channel_type, location, *speed);
            self.slide_params(&note, frames)
        } else {
            None
        };
        let volume_slide_step = match note.volume_slide_target {
            Some(target) => {
                let frames = song.frames_until_next_note(self.channel_type, location, *speed);
                let from = note.volume.unwrap_or_else(|| self.volume_slide.get());
                VolumeSlide::step_for(from, target, frames)
            }
            None => 0,
        };

        let pending = PendingNote {
            note,
            slide,
            volume_slide_step,
        };
        match pending.note.note_delay {
            Some(delay) if delay > 0 => {
                debug!(channel = %self.channel_type, delay, "note delayed");
                self.delayed = Some(pending);
                self.delay_counter = delay as u32 + 1;
                None
            }
            _ => Some(pending),
        }
    }

    fn schedule_after(
        &self,
        song: &dyn SongSource,
        location: NoteLocation,
        rows: Option<u16>,
    ) -> Option<u16> {
        let rows = rows.filter(|&r| r > 0)?;
        if song.advance_location(location, rows as u32).is_none() {
            debug!(channel = %self.channel_type, rows, "scheduled note past song end dropped");
            return None;
        }
        Some(rows)
    }

    fn slide_params(&self, note: &Note, frames: u32) -> Option<SlideParams> {
        let from = note.musical_value()?;
        let to = note.slide_target?;
        let clamp = self.config.clamp_periods;
        Some(SlideParams::new(
            self.tuning.lookup(from as i32, clamp),
            self.tuning.lookup(to as i32, clamp),
            self.tuning.slide_shift,
            frames,
            from,
        ))
    }

    /// Take a delayed note that did not fire before the next row.
    pub(crate) fn take_delayed_note(&mut self) -> Option<PendingNote> {
        self.delay_counter = 0;
        self.delayed.take()
    }

    /// Count down the delayed note; returns it on the frame it fires.
    pub(crate) fn tick_delayed_note(&mut self) -> Option<PendingNote> {
        self.delayed.as_ref()?;
        self.delay_counter = self.delay_counter.saturating_sub(1);
        if self.delay_counter == 0 {
            self.delayed.take()
        } else {
            None
        }
    }

    /// Count down the cut delay; true on the frame it fires.
    pub(crate) fn tick_cut(&mut self) -> bool {
        match self.cut_counter {
            Some(n) if n <= 1 => {
                self.cut_counter = None;
                true
            }
            Some(n) => {
                self.cut_counter = Some(n - 1);
                false
            }
            None => false,
        }
    }

    // ---- note resolution ------------------------------------------------

    /// Resolve `pending` into channel state.
    ///
    /// Returns the instrument whose chip data must be loaded, if any.
    pub(crate) fn play_note(&mut self, pending: PendingNote) -> Option<Arc<Instrument>> {
        let PendingNote {
            mut note,
            slide,
            volume_slide_step,
        } = pending;

        if note.fine_pitch.is_none() {
            note.fine_pitch = self.note.fine_pitch;
        }
        if note.instrument.is_none() {
            note.instrument = self.note.instrument.clone();
        }
        if let Some(inst) = &note.instrument {
            if !inst.supports(self.channel_type) {
                warn!(
                    channel = %self.channel_type,
                    instrument = inst.name(),
                    "instrument ignored on incompatible channel"
                );
                note.instrument = None;
            }
        }
        if !note.is_musical() && note.arpeggio.is_none() {
            note.arpeggio = self.note.arpeggio.clone();
        }

        if !note.is_release() {
            self.slide.reset();
        }
        if note.is_slide() {
            let params = slide.or_else(|| self.slide_params(&note, 1));
            if let (Some(params), Some(target)) = (params, note.slide_target) {
                self.slide.start(params.pitch, params.step, params.source_note);
                note.value = NoteValue::Musical(target);
            }
        }

        if let Some(vibrato) = note.vibrato {
            self.apply_vibrato(vibrato.speed, vibrato.depth, &note);
        }
        if !same_arc(&note.arpeggio, &self.note.arpeggio) {
            self.apply_arpeggio(note.arpeggio.as_ref(), &note);
        }

        let mut load = None;
        match note.value {
            NoteValue::Stop => {
                self.cut_counter = None;
                self.released = false;
                self.attack_pending = false;
                self.note = note;
            }
            NoteValue::Release => {
                if self.note.is_musical() {
                    self.released = true;
                    self.release_pending = true;
                    for slot in &mut self.slots {
                        slot.release();
                    }
                }
                note.value = self.note.value;
                self.note = note;
            }
            NoteValue::Empty => {
                note.value = self.note.value;
                self.note = note;
            }
            NoteValue::Musical(_) => {
                let instrument_changed =
                    self.force_reload || !same_arc(&note.instrument, &self.loaded_instrument);
                let attack = note.attack
                    || instrument_changed
                    || note.instrument.is_none()
                    || self.channel_type == ChannelType::Dpcm
                    || !self.note.is_musical()
                    || self.released;

                if instrument_changed {
                    self.force_reload = false;
                    self.loaded_instrument = note.instrument.clone();
                    self.reload_envelopes(&note);
                    load = note.instrument.clone();
                }
                if attack {
                    self.released = false;
                    self.attack_pending = true;
                    for kind in EnvelopeKind::ALL {
                        if self.keeps_running(kind, &note) {
                            continue;
                        }
                        self.slots[kind.index()].restart();
                    }
                }
                self.note = note;
            }
        }

        let note = &self.note;
        if let Some(volume) = note.volume {
            self.volume_slide.set(volume);
        }
        if let Some(target) = note.volume_slide_target {
            let step = if volume_slide_step != 0 {
                volume_slide_step
            } else {
                VolumeSlide::step_for(self.volume_slide.get(), target, 1)
            };
            self.volume_slide.slide_to(target, step);
        }
        if let Some(cut) = note.cut_delay {
            self.cut_counter = Some(cut as u32 + 1);
        }
        if note.phase_reset {
            self.phase_reset_pending = true;
        }
        if let Some(dc) = note.delta_counter {
            self.delta_counter = Some(dc);
        }
        if let Some(duty) = note.duty_cycle {
            self.effects.duty = Some(duty);
        }
        if let Some(period) = note.env_period {
            self.effects.env_period = Some(period);
        }
        if let Some(depth) = note.fds_mod_depth {
            self.effects.fds_mod_depth = Some(depth);
        }
        if let Some(speed) = note.fds_mod_speed {
            self.effects.fds_mod_speed = Some(speed);
        }

        load
    }

    fn keeps_running(&self, kind: EnvelopeKind, note: &Note) -> bool {
        match kind {
            EnvelopeKind::Pitch => self.vibrato_override,
            EnvelopeKind::Arpeggio => note.arpeggio.is_some(),
            _ => false,
        }
    }

    fn reload_envelopes(&mut self, note: &Note) {
        for kind in EnvelopeKind::ALL {
            if self.keeps_running(kind, note) {
                continue;
            }
            let env = note
                .instrument
                .as_ref()
                .and_then(|inst| inst.envelope(kind).cloned());
            self.slots[kind.index()].bind(env);
        }
        self.effects.fds_mod_depth = None;
        self.effects.fds_mod_speed = None;
    }

    fn apply_vibrato(&mut self, speed: u8, depth: u8, note: &Note) {
        match Envelope::vibrato(speed, depth) {
            Some(env) => {
                self.vibrato_override = true;
                self.slots[EnvelopeKind::Pitch.index()].install(Arc::new(env));
            }
            None if self.vibrato_override => {
                self.vibrato_override = false;
                let env = note
                    .instrument
                    .as_ref()
                    .and_then(|inst| inst.envelope(EnvelopeKind::Pitch).cloned());
                self.slots[EnvelopeKind::Pitch.index()].bind(env);
            }
            None => {}
        }
    }

    fn apply_arpeggio(&mut self, arpeggio: Option<&Arc<Arpeggio>>, note: &Note) {
        let slot = &mut self.slots[EnvelopeKind::Arpeggio.index()];
        match arpeggio {
            Some(arp) => slot.install(arp.envelope().clone()),
            None => {
                let env = note
                    .instrument
                    .as_ref()
                    .and_then(|inst| inst.envelope(EnvelopeKind::Arpeggio).cloned());
                slot.bind(env);
            }
        }
    }

    // ---- per-frame pipeline ---------------------------------------------

    /// Step every envelope the player does not consider empty.
    pub(crate) fn update_envelopes(&mut self) {
        if self.note.instrument.is_none() {
            return;
        }
        let mode = self.config.player;
        let released = self.released;
        for slot in &mut self.slots {
            let Some(env) = slot.envelope() else {
                continue;
            };
            if env.is_empty_for(slot.kind(), mode) {
                continue;
            }
            slot.step(released);
        }
    }

    /// Advance the slide by one frame.
    pub(crate) fn update_slide(&mut self) {
        self.slide.apply_slide();
    }

    /// Advance the volume slide by one frame.
    pub(crate) fn update_volume_slide(&mut self) {
        self.volume_slide.apply_slide();
    }

    /// Clear the one-frame latches.
    pub(crate) fn post_update(&mut self) {
        self.attack_pending = false;
        self.release_pending = false;
        self.phase_reset_pending = false;
        self.frame += 1;
    }

    // ---- helpers for chip drivers -----------------------------------------

    /// Register period (or frequency word) for the current frame.
    pub fn period(&self) -> u16 {
        let Some(value) = self.note.musical_value() else {
            return 0;
        };
        let clamp = self.config.clamp_periods;
        let arp = self.envelope_value(EnvelopeKind::Arpeggio);
        let base = self.tuning.lookup(value as i32 + arp, clamp) as i32;

        let fine = self.note.fine_pitch.unwrap_or(0) as i32;
        let mut pitch =
            (fine + self.envelope_value(EnvelopeKind::Pitch)) << self.tuning.pitch_shift;
        if self.tuning.inverted_pitch {
            pitch = -pitch;
        }
        let period = base + pitch + (self.slide.pitch >> self.tuning.slide_shift);

        let max = self.tuning.max_period as i32;
        if clamp {
            period.clamp(0, max) as u16
        } else {
            (period & max) as u16
        }
    }

    /// Output volume 0..=15.
    pub fn volume(&self) -> u8 {
        let v0 = self.volume_slide.get();
        let v1 = self.envelope_value(EnvelopeKind::Volume).clamp(0, 15) as u8;
        multiply_volume(v0, v1)
    }

    /// Duty cycle: effect override or duty envelope.
    pub fn duty(&self) -> u8 {
        self.effects
            .duty
            .unwrap_or_else(|| self.envelope_value(EnvelopeKind::DutyCycle).max(0) as u8)
    }

    /// Current value of an envelope slot.
    pub fn envelope_value(&self, kind: EnvelopeKind) -> i32 {
        self.slots[kind.index()].value()
    }

    /// Cursor of an envelope slot.
    pub fn envelope_cursor(&self, kind: EnvelopeKind) -> EnvelopeCursor {
        self.slots[kind.index()].cursor()
    }

    /// Envelope slot.
    pub fn slot(&self, kind: EnvelopeKind) -> &EnvelopeSlot {
        &self.slots[kind.index()]
    }

    /// Channel this state drives.
    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    /// Tuning constants.
    pub fn tuning(&self) -> &ChannelTuning {
        &self.tuning
    }

    /// Configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Last resolved note.
    pub fn note(&self) -> &Note {
        &self.note
    }

    /// Instrument of the current note.
    pub fn instrument(&self) -> Option<&Arc<Instrument>> {
        self.note.instrument.as_ref()
    }

    /// Note waiting for its delay to expire.
    pub fn delayed_note(&self) -> Option<&Note> {
        self.delayed.as_ref().map(|p| &p.note)
    }

    /// Frames until the delayed note fires.
    pub fn delay_counter(&self) -> u32 {
        self.delay_counter
    }

    /// Frames until the cut fires.
    pub fn cut_counter(&self) -> Option<u32> {
        self.cut_counter
    }

    /// Rows until an automatic release.
    pub fn release_counter(&self) -> Option<u16> {
        self.release_counter
    }

    /// Rows until an automatic stop.
    pub fn duration_counter(&self) -> Option<u16> {
        self.duration_counter
    }

    /// Slide offset.
    pub fn slide_pitch(&self) -> i32 {
        self.slide.pitch
    }

    /// Slide step.
    pub fn slide_step(&self) -> i32 {
        self.slide.step
    }

    /// Pitch the current slide started from.
    pub fn slide_source_note(&self) -> Option<u8> {
        self.slide.source_note
    }

    /// Volume slide state.
    pub fn volume_slide(&self) -> &VolumeSlide {
        &self.volume_slide
    }

    /// Sticky effects.
    pub fn effects(&self) -> &StickyEffects {
        &self.effects
    }

    /// The current note has been released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// A vibrato effect overrides the pitch envelope.
    pub fn has_vibrato_override(&self) -> bool {
        self.vibrato_override
    }

    /// An attack happened since the last update.
    pub fn attack_pending(&self) -> bool {
        self.attack_pending
    }

    /// A release happened since the last update.
    pub fn release_pending(&self) -> bool {
        self.release_pending
    }

    /// A phase reset was requested since the last update.
    pub fn phase_reset_pending(&self) -> bool {
        self.phase_reset_pending
    }

    /// Consume the latched DPCM delta counter value.
    pub fn take_delta_counter(&mut self) -> Option<u8> {
        self.delta_counter.take()
    }

    /// Frames updated so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// `round(v0/15 * v1/15 * 15)`, at least 1 when both inputs are non-zero.
pub fn multiply_volume(v0: u8, v1: u8) -> u8 {
    let (v0, v1) = (v0.min(15) as u32, v1.min(15) as u32);
    let v = ((v0 * v1 * 2 + 15) / 30) as u8;
    if v == 0 && v0 != 0 && v1 != 0 {
        1
    } else {
        v
    }
}

/// Count a row down; true when the counter expires on this row.
fn tick_rows(counter: &mut Option<u16>) -> bool {
    match *counter {
        Some(n) if n <= 1 => {
            *counter = None;
            true
        }
        Some(n) => {
            *counter = Some(n - 1);
            false
        }
        None => false,
    }
}
