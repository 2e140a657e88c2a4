//! Envelopes and per-channel envelope cursors.
//!
//! Envelopes are shared read-only between channels (`Arc<Envelope>`); every
//! channel walks them with its own [`EnvelopeCursor`].

use std::sync::Arc;

use nom::{
    branch::alt,
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::many0,
    sequence::{delimited, pair},
    IResult,
};
use num_derive::FromPrimitive;

use crate::config::PlayerMode;
use crate::error::{DriverError, Result};

/// Envelope slots every channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum EnvelopeKind {
    /// Volume 0..=15.
    Volume = 0,
    /// Absolute note offset.
    Arpeggio = 1,
    /// Pitch offset, relative or absolute.
    Pitch = 2,
    /// Duty cycle / noise mode.
    DutyCycle = 3,
    /// Frames to hold each waveform of a wave set.
    WaveformRepeat = 4,
    /// 5B/EPSM mixer bits (bit 0 tone, bit 1 noise).
    YmMixerSettings = 5,
    /// 5B/EPSM noise period.
    YmNoiseFreq = 6,
}

impl EnvelopeKind {
    /// Number of envelope slots.
    pub const COUNT: usize = 7;

    /// All kinds in slot order.
    pub const ALL: [EnvelopeKind; Self::COUNT] = [
        EnvelopeKind::Volume,
        EnvelopeKind::Arpeggio,
        EnvelopeKind::Pitch,
        EnvelopeKind::DutyCycle,
        EnvelopeKind::WaveformRepeat,
        EnvelopeKind::YmMixerSettings,
        EnvelopeKind::YmNoiseFreq,
    ];

    /// Slot index.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look a kind up by slot index.
    pub fn from_index(index: usize) -> Option<Self> {
        num_traits::FromPrimitive::from_usize(index)
    }

    /// Value a channel holds for this slot before any envelope ran.
    pub fn default_value(self) -> i32 {
        match self {
            EnvelopeKind::Volume => 15,
            EnvelopeKind::YmMixerSettings => 1,
            _ => 0,
        }
    }
}

/// Position of a channel inside an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeCursor {
    /// No attack has started this envelope yet.
    #[default]
    NotStarted,
    /// Next index to read.
    Active(usize),
    /// A non-looping relative envelope ran past its end.
    Finished,
}

/// An ordered list of envelope values with optional loop and release points.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    values: Vec<i8>,
    loop_point: Option<usize>,
    release_point: Option<usize>,
    relative: bool,
}

const VIBRATO_SPEED_LENGTHS: [usize; 13] = [0, 64, 32, 21, 16, 13, 11, 9, 8, 7, 6, 5, 4];
const VIBRATO_DEPTHS: [f64; 16] = [
    0.0, 1.0, 2.0, 3.0, 4.0, 6.0, 8.0, 10.0, 12.0, 15.0, 18.0, 22.0, 28.0, 35.0, 44.0, 63.0,
];

/// Highest vibrato speed value.
pub const MAX_VIBRATO_SPEED: u8 = 12;
/// Highest vibrato depth value.
pub const MAX_VIBRATO_DEPTH: u8 = 15;

impl Envelope {
    /// Build an envelope, checking loop/release consistency.
    pub fn new(
        values: Vec<i8>,
        loop_point: Option<usize>,
        release_point: Option<usize>,
        relative: bool,
    ) -> Result<Self> {
        if let Some(lp) = loop_point {
            if lp >= values.len() {
                return Err(DriverError::InvalidEnvelope(format!(
                    "loop point {lp} outside of {} values",
                    values.len()
                )));
            }
        }
        if let Some(rp) = release_point {
            if rp == 0 || rp >= values.len() {
                return Err(DriverError::InvalidEnvelope(format!(
                    "release point {rp} outside of 1..{}",
                    values.len()
                )));
            }
            if loop_point.is_some_and(|lp| lp >= rp) {
                return Err(DriverError::InvalidEnvelope(
                    "loop point must come before the release point".to_string(),
                ));
            }
        }
        Ok(Self {
            values,
            loop_point,
            release_point,
            relative,
        })
    }

    /// Absolute envelope without loop or release.
    pub fn from_values(values: Vec<i8>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// Same values, accumulated instead of overwritten.
    pub fn into_relative(mut self) -> Self {
        self.relative = true;
        self
    }

    /// Generated pitch envelope for a vibrato effect.
    ///
    /// Returns `None` when either parameter is zero (vibrato off).
    pub fn vibrato(speed: u8, depth: u8) -> Option<Self> {
        if speed == 0 || depth == 0 {
            return None;
        }
        let length = VIBRATO_SPEED_LENGTHS[speed.min(MAX_VIBRATO_SPEED) as usize];
        let amplitude = VIBRATO_DEPTHS[depth.min(MAX_VIBRATO_DEPTH) as usize];
        let values = (0..length)
            .map(|i| {
                let phase = i as f64 * 2.0 * std::f64::consts::PI / length as f64;
                (amplitude * -phase.sin()).round() as i8
            })
            .collect();
        Some(Self {
            values,
            loop_point: Some(0),
            release_point: None,
            relative: false,
        })
    }

    /// Parse the MML text form, e.g. `"15 12 | 10 8 / 4 0"`.
    ///
    /// `|` marks the loop point and `/` the release point; both refer to the
    /// index of the value that follows them.
    pub fn parse(text: &str) -> Result<Self> {
        let (_, tokens) = all_consuming(mml_tokens)(text)
            .map_err(|e| DriverError::InvalidEnvelope(format!("'{text}': {e}")))?;

        let mut values = Vec::new();
        let mut loop_point = None;
        let mut release_point = None;
        for token in tokens {
            match token {
                MmlToken::Value(v) => values.push(v),
                MmlToken::Loop if loop_point.is_none() => loop_point = Some(values.len()),
                MmlToken::Release if release_point.is_none() => {
                    release_point = Some(values.len())
                }
                MmlToken::Loop | MmlToken::Release => {
                    return Err(DriverError::InvalidEnvelope(format!(
                        "'{text}': duplicated loop or release marker"
                    )))
                }
            }
        }
        Self::new(values, loop_point, release_point, false)
    }

    /// Values.
    pub fn values(&self) -> &[i8] {
        &self.values
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when there are no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`.
    pub fn value(&self, index: usize) -> i8 {
        self.values[index]
    }

    /// Loop target.
    pub fn loop_point(&self) -> Option<usize> {
        self.loop_point
    }

    /// Release target.
    pub fn release_point(&self) -> Option<usize> {
        self.release_point
    }

    /// Values accumulate into a running total.
    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Whether a channel can skip this envelope entirely.
    pub fn is_empty_for(&self, kind: EnvelopeKind, mode: PlayerMode) -> bool {
        if self.values.is_empty() {
            return true;
        }
        match mode {
            PlayerMode::Preview => false,
            PlayerMode::Accurate => {
                if kind == EnvelopeKind::WaveformRepeat {
                    return false;
                }
                let neutral = if self.relative {
                    0
                } else {
                    kind.default_value()
                };
                self.loop_point.is_none()
                    && self.release_point.is_none()
                    && self.values.iter().all(|&v| v as i32 == neutral)
            }
        }
    }

    /// Cheap shared handle.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[derive(Debug, Clone, Copy)]
enum MmlToken {
    Value(i8),
    Loop,
    Release,
}

fn mml_value(input: &str) -> IResult<&str, MmlToken> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i8>().map(MmlToken::Value)
    })(input)
}

fn mml_token(input: &str) -> IResult<&str, MmlToken> {
    alt((
        mml_value,
        map(char('|'), |_| MmlToken::Loop),
        map(char('/'), |_| MmlToken::Release),
    ))(input)
}

fn mml_tokens(input: &str) -> IResult<&str, Vec<MmlToken>> {
    many0(delimited(multispace0, mml_token, multispace0))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_loop_and_release() {
        let env = Envelope::parse("15 12 | 10 8 / 4 0").unwrap();
        assert_eq!(env.values(), &[15, 12, 10, 8, 4, 0]);
        assert_eq!(env.loop_point(), Some(2));
        assert_eq!(env.release_point(), Some(4));
        assert!(!env.is_relative());
    }

    #[test]
    fn parse_negative_values_without_spaces() {
        let env = Envelope::parse("0 -1|-2 -1").unwrap();
        assert_eq!(env.values(), &[0, -1, -2, -1]);
        assert_eq!(env.loop_point(), Some(2));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Envelope::parse("1 2 x").is_err());
        assert!(Envelope::parse("1 | 2 | 3").is_err());
        assert!(Envelope::parse("300").is_err());
    }

    #[test]
    fn release_must_follow_loop() {
        assert!(Envelope::new(vec![1, 2, 3], Some(2), Some(1), false).is_err());
        assert!(Envelope::new(vec![1, 2, 3], None, Some(0), false).is_err());
    }

    #[test]
    fn vibrato_shape() {
        assert!(Envelope::vibrato(0, 5).is_none());
        assert!(Envelope::vibrato(4, 0).is_none());

        let env = Envelope::vibrato(4, 15).unwrap();
        assert_eq!(env.len(), 16);
        assert_eq!(env.loop_point(), Some(0));
        assert_eq!(env.value(0), 0);
        assert_eq!(env.value(4), -63);
        assert_eq!(env.value(12), 63);
    }

    #[test]
    fn empty_depends_on_player() {
        let flat_volume = Envelope::from_values(vec![15, 15, 15]);
        assert!(flat_volume.is_empty_for(EnvelopeKind::Volume, PlayerMode::Accurate));
        assert!(!flat_volume.is_empty_for(EnvelopeKind::Volume, PlayerMode::Preview));

        let zero_pitch = Envelope::from_values(vec![0, 0]).into_relative();
        assert!(zero_pitch.is_empty_for(EnvelopeKind::Pitch, PlayerMode::Accurate));

        let repeat = Envelope::from_values(vec![0]);
        assert!(!repeat.is_empty_for(EnvelopeKind::WaveformRepeat, PlayerMode::Accurate));
    }

    #[test]
    fn kind_lookup() {
        assert_eq!(EnvelopeKind::from_index(2), Some(EnvelopeKind::Pitch));
        assert_eq!(EnvelopeKind::from_index(EnvelopeKind::COUNT), None);
        for kind in EnvelopeKind::ALL {
            assert_eq!(EnvelopeKind::from_index(kind.index()), Some(kind));
        }
    }
}
