//! Instruments and arpeggios.
//!
//! An [`Instrument`] bundles the envelopes every channel reads plus a
//! chip-specific payload ([`InstrumentKind`]). Constructors validate the chip
//! data so channel drivers can index it without checks.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::channel_type::{ChannelType, Chip};
use crate::envelope::{Envelope, EnvelopeKind};
use crate::error::{DriverError, Result};

/// FDS waveform length.
pub const FDS_WAVE_LEN: usize = 64;
/// FDS modulation table length.
pub const FDS_MOD_LEN: usize = 32;
/// Raw EPSM FM patch length.
pub const EPSM_PATCH_LEN: usize = 31;
/// N163 wave RAM size in 4-bit samples.
pub const N163_RAM_SAMPLES: u16 = 256;

/// A DPCM sample already placed in CPU memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpcmSample {
    name: String,
    address: u16,
    length: u16,
    dmc_initial: u8,
}

impl DpcmSample {
    /// Describe a sample at `address` spanning `length` bytes.
    ///
    /// The address must be a multiple of 64 in `$C000..=$FFC0` and the length
    /// of the form `16 * n + 1` bytes, at most 4081.
    pub fn new(name: &str, address: u16, length: u16) -> Result<Self> {
        if address < 0xC000 || address % 64 != 0 {
            return Err(DriverError::instrument(
                name,
                format!("sample address ${address:04X} is not a 64-byte aligned $C000+ address"),
            ));
        }
        if length == 0 || length > 4081 || (length - 1) % 16 != 0 {
            return Err(DriverError::instrument(
                name,
                format!("sample length {length} is not 16*n+1 bytes up to 4081"),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            address,
            length,
            dmc_initial: 64,
        })
    }

    /// Copy with a different default delta counter value.
    pub fn with_dmc_initial(mut self, value: u8) -> Self {
        self.dmc_initial = value & 0x7F;
        self
    }

    /// Sample name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `$4012` value.
    pub fn address_register(&self) -> u8 {
        ((self.address - 0xC000) >> 6) as u8
    }

    /// `$4013` value.
    pub fn length_register(&self) -> u8 {
        ((self.length - 1) >> 4) as u8
    }

    /// Default delta counter value.
    pub fn dmc_initial(&self) -> u8 {
        self.dmc_initial
    }
}

/// How one note of a 2A03 instrument triggers a DPCM sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpcmMapping {
    /// Sample to play.
    pub sample: Arc<DpcmSample>,
    /// DMC rate index 0..=15.
    pub pitch: u8,
    /// Loop flag.
    pub looping: bool,
    /// Delta counter override.
    pub dmc_initial: Option<u8>,
}

impl DpcmMapping {
    /// Map to `sample` at `pitch`, not looping.
    pub fn new(sample: Arc<DpcmSample>, pitch: u8) -> Self {
        Self {
            sample,
            pitch: pitch & 0x0F,
            looping: false,
            dmc_initial: None,
        }
    }

    /// Copy with the loop flag set.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Copy with a delta counter override.
    pub fn with_dmc_initial(mut self, value: u8) -> Self {
        self.dmc_initial = Some(value & 0x7F);
        self
    }

    /// `$4010` value.
    pub fn rate_register(&self) -> u8 {
        (if self.looping { 0x40 } else { 0x00 }) | self.pitch
    }
}

/// VRC6 saw output scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SawMasterVolume {
    /// Accumulator rate `volume << 2`, distorts at the top.
    Full,
    /// Accumulator rate `volume << 1`.
    #[default]
    Half,
    /// Accumulator rate `volume`.
    Quarter,
}

impl SawMasterVolume {
    /// Accumulator rate for a channel volume 0..=15.
    pub fn scale(self, volume: u8) -> u8 {
        let shift = match self {
            SawMasterVolume::Full => 2,
            SawMasterVolume::Half => 1,
            SawMasterVolume::Quarter => 0,
        };
        ((volume as u16) << shift).min(0x3F) as u8
    }
}

/// VRC7 patch: a built-in preset or custom operator registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vrc7Patch {
    /// Preset 1..=15, 0 selects the custom registers.
    pub preset: u8,
    /// Custom patch registers `$00..=$07`.
    pub custom: [u8; 8],
}

impl Vrc7Patch {
    /// Built-in preset.
    pub fn preset(preset: u8) -> Self {
        Self {
            preset: preset & 0x0F,
            custom: [0; 8],
        }
    }

    /// Custom patch.
    pub fn custom(regs: [u8; 8]) -> Self {
        Self {
            preset: 0,
            custom: regs,
        }
    }

    /// Custom registers need uploading.
    pub fn is_custom(&self) -> bool {
        self.preset == 0
    }
}

/// FDS wave and modulation data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdsInstrument {
    wave: [u8; FDS_WAVE_LEN],
    mod_table: [u8; FDS_MOD_LEN],
    /// Modulation speed (12 bits).
    pub mod_speed: u16,
    /// Modulation depth (6 bits).
    pub mod_depth: u8,
    /// Frames after attack with modulation held off.
    pub mod_delay: u8,
    /// Master volume 0..=3 (`$4089` low bits).
    pub master_volume: u8,
}

impl FdsInstrument {
    /// Build from a 64 sample wave (0..=63) and a 32 entry modulation table (0..=7).
    pub fn new(name: &str, wave: &[u8], mod_table: &[u8]) -> Result<Self> {
        let wave: [u8; FDS_WAVE_LEN] = wave.try_into().map_err(|_| {
            DriverError::instrument(
                name,
                format!("FDS wave has {} samples, expected 64", wave.len()),
            )
        })?;
        let mod_table: [u8; FDS_MOD_LEN] = mod_table.try_into().map_err(|_| {
            DriverError::instrument(
                name,
                format!("FDS modulation table has {} entries, expected 32", mod_table.len()),
            )
        })?;
        if let Some(bad) = wave.iter().find(|&&s| s > 63) {
            return Err(DriverError::instrument(name, format!("FDS wave sample {bad} > 63")));
        }
        if let Some(bad) = mod_table.iter().find(|&&m| m > 7) {
            return Err(DriverError::instrument(name, format!("FDS modulation entry {bad} > 7")));
        }
        Ok(Self {
            wave,
            mod_table,
            mod_speed: 0,
            mod_depth: 0,
            mod_delay: 0,
            master_volume: 0,
        })
    }

    /// Copy with modulation parameters.
    pub fn with_modulation(mut self, speed: u16, depth: u8, delay: u8) -> Self {
        self.mod_speed = speed & 0x0FFF;
        self.mod_depth = depth & 0x3F;
        self.mod_delay = delay;
        self
    }

    /// Wave samples.
    pub fn wave(&self) -> &[u8; FDS_WAVE_LEN] {
        &self.wave
    }

    /// Modulation table.
    pub fn mod_table(&self) -> &[u8; FDS_MOD_LEN] {
        &self.mod_table
    }
}

/// N163 wave set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct N163Instrument {
    wave_size: u8,
    waves: Vec<Vec<u8>>,
    wave_position: Option<u8>,
}

impl N163Instrument {
    /// Build from one or more waves of `wave_size` 4-bit samples.
    ///
    /// `wave_position` is the sample offset in wave RAM, `None` lets the bus
    /// allocate one.
    pub fn new(
        name: &str,
        wave_size: u8,
        waves: Vec<Vec<u8>>,
        wave_position: Option<u8>,
    ) -> Result<Self> {
        if wave_size < 4 || wave_size > 248 || wave_size % 4 != 0 {
            return Err(DriverError::instrument(
                name,
                format!("N163 wave size {wave_size} must be a multiple of 4 in 4..=248"),
            ));
        }
        if waves.is_empty() {
            return Err(DriverError::instrument(name, "N163 instrument needs a wave"));
        }
        for (i, wave) in waves.iter().enumerate() {
            if wave.len() != wave_size as usize {
                return Err(DriverError::instrument(
                    name,
                    format!("N163 wave {i} has {} samples, expected {wave_size}", wave.len()),
                ));
            }
            if wave.iter().any(|&s| s > 15) {
                return Err(DriverError::instrument(
                    name,
                    format!("N163 wave {i} has samples above 15"),
                ));
            }
        }
        if let Some(pos) = wave_position {
            if pos % 2 != 0 || pos as u16 + wave_size as u16 > N163_RAM_SAMPLES {
                return Err(DriverError::instrument(
                    name,
                    format!("N163 wave position {pos} does not fit a {wave_size} sample wave"),
                ));
            }
        }
        Ok(Self {
            wave_size,
            waves,
            wave_position,
        })
    }

    /// Samples per wave.
    pub fn wave_size(&self) -> u8 {
        self.wave_size
    }

    /// Number of waves.
    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    /// Wave `index`, clamped to the last wave.
    pub fn wave(&self, index: usize) -> &[u8] {
        &self.waves[index.min(self.waves.len() - 1)]
    }

    /// Fixed wave position.
    pub fn wave_position(&self) -> Option<u8> {
        self.wave_position
    }

    /// Wave `index` packed two samples per byte, low nibble first.
    pub fn packed_wave(&self, index: usize) -> Vec<u8> {
        self.wave(index)
            .chunks(2)
            .map(|pair| pair[0] | (pair.get(1).copied().unwrap_or(0) << 4))
            .collect()
    }
}

/// Hardware envelope settings of a 5B or EPSM SSG instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PsgEnvelopeSettings {
    /// Envelope shape 8..=15, 0 disables the hardware envelope.
    pub shape: u8,
    /// Derive the envelope period from the note period.
    pub auto_pitch: bool,
    /// Octave offset of the auto-pitch period, -8..=8.
    pub auto_pitch_octave: i8,
    /// Manual envelope period.
    pub period: u16,
}

impl PsgEnvelopeSettings {
    /// Hardware envelope in use.
    pub fn is_enabled(&self) -> bool {
        self.shape != 0
    }
}

/// Raw YM2608 FM voice registers.
///
/// Layout: `$B0` feedback/algorithm, `$B4` pan/AMS/PMS, then seven registers
/// per operator (`$30 $40 $50 $60 $70 $80 $90`) for operators 1 to 4, then the
/// `$22` LFO register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpsmPatch {
    raw: [u8; EPSM_PATCH_LEN],
}

/// Register bases of the per-operator bytes of an [`EpsmPatch`].
pub const EPSM_OPERATOR_REGS: [u8; 7] = [0x30, 0x40, 0x50, 0x60, 0x70, 0x80, 0x90];

impl EpsmPatch {
    /// Wrap exactly 31 raw bytes.
    pub fn new(name: &str, raw: &[u8]) -> Result<Self> {
        let raw: [u8; EPSM_PATCH_LEN] = raw.try_into().map_err(|_| {
            DriverError::instrument(
                name,
                format!("EPSM patch has {} bytes, expected 31", raw.len()),
            )
        })?;
        Ok(Self { raw })
    }

    /// Raw bytes.
    pub fn raw(&self) -> &[u8; EPSM_PATCH_LEN] {
        &self.raw
    }

    /// Algorithm 0..=7.
    pub fn algorithm(&self) -> u8 {
        self.raw[0] & 0x07
    }

    /// `$B0` value.
    pub fn feedback_algorithm(&self) -> u8 {
        self.raw[0]
    }

    /// `$B4` value.
    pub fn pan_lfo(&self) -> u8 {
        self.raw[1]
    }

    /// `$22` value.
    pub fn lfo(&self) -> u8 {
        self.raw[30]
    }

    /// Operator `op` (0..=3) byte for register base `reg_index`.
    ///
    /// `reg_index` indexes [`EPSM_OPERATOR_REGS`].
    pub fn operator_reg(&self, op: usize, reg_index: usize) -> u8 {
        self.raw[2 + op * 7 + reg_index]
    }

    /// Operator total level (attenuation) 0..=127.
    pub fn total_level(&self, op: usize) -> u8 {
        self.operator_reg(op, 1) & 0x7F
    }
}

/// EPSM instrument, used by the SSG and FM channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpsmInstrument {
    /// FM voice.
    pub patch: EpsmPatch,
    /// SSG hardware envelope.
    pub envelope: PsgEnvelopeSettings,
}

/// Chip-specific instrument payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentKind {
    /// 2A03/MMC5 instrument with DPCM note mappings.
    Apu {
        /// Mappings keyed by musical note value.
        dpcm: BTreeMap<u8, DpcmMapping>,
    },
    /// VRC6 instrument.
    Vrc6 {
        /// Saw output scaling.
        saw_master_volume: SawMasterVolume,
    },
    /// VRC7 instrument.
    Vrc7(Vrc7Patch),
    /// FDS instrument.
    Fds(FdsInstrument),
    /// N163 instrument.
    N163(N163Instrument),
    /// Sunsoft 5B instrument.
    S5B(PsgEnvelopeSettings),
    /// EPSM instrument.
    Epsm(EpsmInstrument),
}

impl InstrumentKind {
    /// Chip this payload is written for.
    pub fn chip(&self) -> Chip {
        match self {
            InstrumentKind::Apu { .. } => Chip::Apu2A03,
            InstrumentKind::Vrc6 { .. } => Chip::Vrc6,
            InstrumentKind::Vrc7(_) => Chip::Vrc7,
            InstrumentKind::Fds(_) => Chip::Fds,
            InstrumentKind::N163(_) => Chip::N163,
            InstrumentKind::S5B(_) => Chip::S5B,
            InstrumentKind::Epsm(_) => Chip::Epsm,
        }
    }
}

/// An instrument: envelopes plus chip data.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    name: String,
    envelopes: [Option<Arc<Envelope>>; EnvelopeKind::COUNT],
    kind: InstrumentKind,
}

impl Instrument {
    /// Instrument without envelopes.
    pub fn new(name: &str, kind: InstrumentKind) -> Self {
        Self {
            name: name.to_string(),
            envelopes: Default::default(),
            kind,
        }
    }

    /// Plain 2A03 instrument.
    pub fn apu(name: &str) -> Self {
        Self::new(
            name,
            InstrumentKind::Apu {
                dpcm: BTreeMap::new(),
            },
        )
    }

    /// Copy with an envelope in slot `kind`.
    pub fn with_envelope(mut self, kind: EnvelopeKind, envelope: Envelope) -> Self {
        self.envelopes[kind.index()] = Some(envelope.shared());
        self
    }

    /// Copy with a DPCM mapping for `note`. Ignored on non-2A03 instruments.
    pub fn with_dpcm_mapping(mut self, note: u8, mapping: DpcmMapping) -> Self {
        if let InstrumentKind::Apu { dpcm } = &mut self.kind {
            dpcm.insert(note, mapping);
        }
        self
    }

    /// Instrument name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chip payload.
    pub fn kind(&self) -> &InstrumentKind {
        &self.kind
    }

    /// Envelope in slot `kind`.
    pub fn envelope(&self, kind: EnvelopeKind) -> Option<&Arc<Envelope>> {
        self.envelopes[kind.index()].as_ref()
    }

    /// Usable on `channel`.
    pub fn supports(&self, channel: ChannelType) -> bool {
        match (self.kind.chip(), channel.chip()) {
            (Chip::Apu2A03, Chip::Mmc5) => true,
            (a, b) => a == b,
        }
    }

    /// DPCM mapping for a musical note value.
    pub fn dpcm_mapping(&self, note: u8) -> Option<&DpcmMapping> {
        match &self.kind {
            InstrumentKind::Apu { dpcm } => dpcm.get(&note),
            _ => None,
        }
    }

    /// VRC6 saw scaling.
    pub fn saw_master_volume(&self) -> SawMasterVolume {
        match &self.kind {
            InstrumentKind::Vrc6 { saw_master_volume } => *saw_master_volume,
            _ => SawMasterVolume::default(),
        }
    }

    /// VRC7 patch.
    pub fn vrc7(&self) -> Option<&Vrc7Patch> {
        match &self.kind {
            InstrumentKind::Vrc7(p) => Some(p),
            _ => None,
        }
    }

    /// FDS data.
    pub fn fds(&self) -> Option<&FdsInstrument> {
        match &self.kind {
            InstrumentKind::Fds(f) => Some(f),
            _ => None,
        }
    }

    /// N163 data.
    pub fn n163(&self) -> Option<&N163Instrument> {
        match &self.kind {
            InstrumentKind::N163(n) => Some(n),
            _ => None,
        }
    }

    /// EPSM data.
    pub fn epsm(&self) -> Option<&EpsmInstrument> {
        match &self.kind {
            InstrumentKind::Epsm(e) => Some(e),
            _ => None,
        }
    }

    /// PSG hardware envelope settings (5B or EPSM).
    pub fn psg_envelope(&self) -> Option<&PsgEnvelopeSettings> {
        match &self.kind {
            InstrumentKind::S5B(s) => Some(s),
            InstrumentKind::Epsm(e) => Some(&e.envelope),
            _ => None,
        }
    }

    /// Cheap shared handle.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// Named absolute note-offset envelope overriding an instrument's arpeggio.
#[derive(Debug, Clone, PartialEq)]
pub struct Arpeggio {
    name: String,
    envelope: Arc<Envelope>,
}

impl Arpeggio {
    /// Build from an absolute envelope.
    pub fn new(name: &str, envelope: Envelope) -> Result<Self> {
        if envelope.is_relative() {
            return Err(DriverError::InvalidEnvelope(format!(
                "arpeggio '{name}' must be absolute"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            envelope: envelope.shared(),
        })
    }

    /// Arpeggio name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Note offsets.
    pub fn envelope(&self) -> &Arc<Envelope> {
        &self.envelope
    }

    /// Cheap shared handle.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fds_tables_are_validated() {
        let wave = vec![32u8; 64];
        let modt = vec![0u8; 32];
        assert!(FdsInstrument::new("ok", &wave, &modt).is_ok());
        assert!(FdsInstrument::new("short", &wave[..63], &modt).is_err());
        assert!(FdsInstrument::new("mod", &wave, &vec![8u8; 32]).is_err());
        assert!(FdsInstrument::new("loud", &vec![64u8; 64], &modt).is_err());
    }

    #[test]
    fn n163_waves_are_validated() {
        assert!(N163Instrument::new("ok", 16, vec![vec![15; 16]], Some(0)).is_ok());
        assert!(N163Instrument::new("size", 6, vec![vec![0; 6]], None).is_err());
        assert!(N163Instrument::new("len", 8, vec![vec![0; 7]], None).is_err());
        assert!(N163Instrument::new("range", 4, vec![vec![16, 0, 0, 0]], None).is_err());
        assert!(N163Instrument::new("pos", 32, vec![vec![0; 32]], Some(240)).is_err());
    }

    #[test]
    fn n163_packing_is_low_nibble_first() {
        let inst = N163Instrument::new("w", 4, vec![vec![1, 2, 3, 4]], None).unwrap();
        assert_eq!(inst.packed_wave(0), vec![0x21, 0x43]);
        assert_eq!(inst.wave(5), &[1, 2, 3, 4]);
    }

    #[test]
    fn epsm_patch_layout() {
        assert!(EpsmPatch::new("short", &[0; 30]).is_err());
        let mut raw = [0u8; EPSM_PATCH_LEN];
        raw[0] = 0x3D;
        raw[2 + 7 + 1] = 0x9F;
        let patch = EpsmPatch::new("p", &raw).unwrap();
        assert_eq!(patch.algorithm(), 5);
        assert_eq!(patch.total_level(1), 0x1F);
    }

    #[test]
    fn dpcm_registers() {
        let sample = Arc::new(DpcmSample::new("kick", 0xC040, 0x21).unwrap());
        let mapping = DpcmMapping::new(sample, 15).looping();
        assert_eq!(mapping.rate_register(), 0x4F);
        assert_eq!(mapping.sample.address_register(), 1);
        assert_eq!(mapping.sample.length_register(), 2);
        assert!(DpcmSample::new("odd", 0xC001, 1).is_err());
        assert!(DpcmSample::new("len", 0xC000, 2).is_err());
    }

    #[test]
    fn apu_instruments_play_on_mmc5() {
        let inst = Instrument::apu("lead");
        assert!(inst.supports(ChannelType::Mmc5Square(0)));
        assert!(inst.supports(ChannelType::Dpcm));
        assert!(!inst.supports(ChannelType::Fds));
    }
}
