//! Note value model.
//!
//! A [`Note`] is a snapshot of one pattern cell: a pitch (or a stop/release
//! marker), optional instrument/arpeggio references and any number of effects.
//! Notes are plain values; every modification goes through a `with_*` method
//! that returns a modified copy.

use std::sync::Arc;

use crate::instrument::{Arpeggio, Instrument};

/// Lowest musical note value (C0).
pub const MUSICAL_NOTE_MIN: u8 = 1;
/// Highest musical note value (B7).
pub const MUSICAL_NOTE_MAX: u8 = 96;
/// Number of entries in a note table (index 0 is unused).
pub const NOTE_TABLE_SIZE: usize = MUSICAL_NOTE_MAX as usize + 1;

/// What a note asks the channel to do with its pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteValue {
    /// No pitch change, effects only.
    #[default]
    Empty,
    /// Silence the channel.
    Stop,
    /// Enter the release part of the envelopes.
    Release,
    /// Play a pitch, `MUSICAL_NOTE_MIN..=MUSICAL_NOTE_MAX`.
    Musical(u8),
}

/// Vibrato effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vibrato {
    /// Speed index, 0 = off.
    pub speed: u8,
    /// Depth index, 0 = off.
    pub depth: u8,
}

/// One musical event.
#[derive(Debug, Clone)]
pub struct Note {
    /// Pitch or marker.
    pub value: NoteValue,
    /// Instrument, inherited from the previous note when `None`.
    pub instrument: Option<Arc<Instrument>>,
    /// Arpeggio overriding the instrument's arpeggio envelope.
    pub arpeggio: Option<Arc<Arpeggio>>,
    /// Restart envelopes on this note.
    pub attack: bool,
    /// Fine pitch offset.
    pub fine_pitch: Option<i8>,
    /// Duty cycle override, sticky across notes.
    pub duty_cycle: Option<u8>,
    /// Note volume 0..=15.
    pub volume: Option<u8>,
    /// Target of a volume slide starting at `volume`.
    pub volume_slide_target: Option<u8>,
    /// Destination of a slide starting at `value`.
    pub slide_target: Option<u8>,
    /// Vibrato parameters.
    pub vibrato: Option<Vibrato>,
    /// Frames to wait before the note becomes active.
    pub note_delay: Option<u8>,
    /// Frames before the note is forcibly stopped.
    pub cut_delay: Option<u8>,
    /// DPCM initial delta counter value.
    pub delta_counter: Option<u8>,
    /// Hardware envelope period (5B/EPSM).
    pub env_period: Option<u16>,
    /// FDS modulation depth override.
    pub fds_mod_depth: Option<u8>,
    /// FDS modulation speed override.
    pub fds_mod_speed: Option<u16>,
    /// Song speed change.
    pub speed: Option<u8>,
    /// Restart the waveform phase.
    pub phase_reset: bool,
    /// Rows after which a release is generated.
    pub release: Option<u16>,
    /// Rows after which a stop is generated.
    pub duration: Option<u16>,
}

impl Default for Note {
    fn default() -> Self {
        Self {
            value: NoteValue::Empty,
            instrument: None,
            arpeggio: None,
            attack: true,
            fine_pitch: None,
            duty_cycle: None,
            volume: None,
            volume_slide_target: None,
            slide_target: None,
            vibrato: None,
            note_delay: None,
            cut_delay: None,
            delta_counter: None,
            env_period: None,
            fds_mod_depth: None,
            fds_mod_speed: None,
            speed: None,
            phase_reset: false,
            release: None,
            duration: None,
        }
    }
}

impl Note {
    /// Effect-only note.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stop note.
    pub fn stop() -> Self {
        Self {
            value: NoteValue::Stop,
            ..Self::default()
        }
    }

    /// Release note.
    pub fn release() -> Self {
        Self {
            value: NoteValue::Release,
            ..Self::default()
        }
    }

    /// Musical note with the given pitch.
    pub fn musical(value: u8) -> Self {
        debug_assert!((MUSICAL_NOTE_MIN..=MUSICAL_NOTE_MAX).contains(&value));
        Self {
            value: NoteValue::Musical(value),
            ..Self::default()
        }
    }

    /// Musical note from octave (0..=7) and semitone (0..=11).
    pub fn from_octave(octave: u8, semitone: u8) -> Self {
        Self::musical(octave * 12 + semitone + MUSICAL_NOTE_MIN)
    }

    /// Copy with a different value.
    pub fn with_value(mut self, value: NoteValue) -> Self {
        self.value = value;
        self
    }

    /// Copy with an instrument.
    pub fn with_instrument(mut self, instrument: Arc<Instrument>) -> Self {
        self.instrument = Some(instrument);
        self
    }

    /// Copy with an arpeggio.
    pub fn with_arpeggio(mut self, arpeggio: Arc<Arpeggio>) -> Self {
        self.arpeggio = Some(arpeggio);
        self
    }

    /// Copy with the attack flag set.
    pub fn with_attack(mut self, attack: bool) -> Self {
        self.attack = attack;
        self
    }

    /// Copy with a fine pitch offset.
    pub fn with_fine_pitch(mut self, pitch: i8) -> Self {
        self.fine_pitch = Some(pitch);
        self
    }

    /// Copy with a duty cycle override.
    pub fn with_duty_cycle(mut self, duty: u8) -> Self {
        self.duty_cycle = Some(duty);
        self
    }

    /// Copy with a note volume.
    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume.min(15));
        self
    }

    /// Copy with a volume slide target.
    pub fn with_volume_slide(mut self, target: u8) -> Self {
        self.volume_slide_target = Some(target.min(15));
        self
    }

    /// Copy with a slide destination.
    pub fn with_slide_to(mut self, target: u8) -> Self {
        self.slide_target = Some(target);
        self
    }

    /// Copy with a vibrato effect.
    pub fn with_vibrato(mut self, speed: u8, depth: u8) -> Self {
        self.vibrato = Some(Vibrato { speed, depth });
        self
    }

    /// Copy with a note delay.
    pub fn with_note_delay(mut self, frames: u8) -> Self {
        self.note_delay = Some(frames);
        self
    }

    /// Copy with a cut delay.
    pub fn with_cut_delay(mut self, frames: u8) -> Self {
        self.cut_delay = Some(frames);
        self
    }

    /// Copy with a DPCM delta counter value.
    pub fn with_delta_counter(mut self, value: u8) -> Self {
        self.delta_counter = Some(value & 0x7F);
        self
    }

    /// Copy with a hardware envelope period.
    pub fn with_env_period(mut self, period: u16) -> Self {
        self.env_period = Some(period);
        self
    }

    /// Copy with an FDS modulation depth.
    pub fn with_fds_mod_depth(mut self, depth: u8) -> Self {
        self.fds_mod_depth = Some(depth & 0x3F);
        self
    }

    /// Copy with an FDS modulation speed.
    pub fn with_fds_mod_speed(mut self, speed: u16) -> Self {
        self.fds_mod_speed = Some(speed & 0x0FFF);
        self
    }

    /// Copy with a speed change.
    pub fn with_speed(mut self, speed: u8) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Copy with a phase reset.
    pub fn with_phase_reset(mut self) -> Self {
        self.phase_reset = true;
        self
    }

    /// Copy that auto-releases after `rows`.
    pub fn with_release(mut self, rows: u16) -> Self {
        self.release = Some(rows);
        self
    }

    /// Copy that auto-stops after `rows`.
    pub fn with_duration(mut self, rows: u16) -> Self {
        self.duration = Some(rows);
        self
    }

    /// Pitch value when musical.
    pub fn musical_value(&self) -> Option<u8> {
        match self.value {
            NoteValue::Musical(v) => Some(v),
            _ => None,
        }
    }

    /// Musical note.
    pub fn is_musical(&self) -> bool {
        matches!(self.value, NoteValue::Musical(_))
    }

    /// Stop note.
    pub fn is_stop(&self) -> bool {
        self.value == NoteValue::Stop
    }

    /// Release note.
    pub fn is_release(&self) -> bool {
        self.value == NoteValue::Release
    }

    /// Effect-only note.
    pub fn is_empty(&self) -> bool {
        self.value == NoteValue::Empty
    }

    /// Slide effect present on a musical note.
    pub fn is_slide(&self) -> bool {
        self.is_musical() && self.slide_target.is_some()
    }
}

/// Display name of a musical note value, e.g. `A-4`.
pub fn note_name(value: u8) -> String {
    const NAMES: [&str; 12] = [
        "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
    ];
    if !(MUSICAL_NOTE_MIN..=MUSICAL_NOTE_MAX).contains(&value) {
        return "---".to_string();
    }
    let v = value - MUSICAL_NOTE_MIN;
    format!("{}{}", NAMES[(v % 12) as usize], v / 12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_leave_source_untouched() {
        let base = Note::musical(40);
        let louder = base.clone().with_volume(20).with_fine_pitch(-3);
        assert_eq!(base.volume, None);
        assert_eq!(louder.volume, Some(15));
        assert_eq!(louder.fine_pitch, Some(-3));
        assert_eq!(louder.value, NoteValue::Musical(40));
    }

    #[test]
    fn markers() {
        assert!(Note::stop().is_stop());
        assert!(Note::release().is_release());
        assert!(Note::empty().is_empty());
        assert!(Note::default().attack);
        assert!(!Note::empty().with_slide_to(10).is_slide());
        assert!(Note::musical(12).with_slide_to(10).is_slide());
    }

    #[test]
    fn names() {
        assert_eq!(note_name(1), "C-0");
        assert_eq!(note_name(58), "A-4");
        assert_eq!(note_name(96), "B-7");
        assert_eq!(note_name(0), "---");
        assert_eq!(Note::from_octave(4, 9).musical_value(), Some(58));
    }
}
