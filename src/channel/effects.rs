//! Slide and volume-slide state.

/// Integer volume with 8 fractional bits.
pub const VOLUME_FRAC_BITS: u32 = 8;

/// State for slide-to-note effects
///
/// `pitch` is a period offset in slide units (period << slide_shift) that
/// decays to zero; the note itself already holds the destination pitch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PitchSlide {
    /// Current offset
    pub pitch: i32,
    /// Offset change per frame
    pub step: i32,
    /// Note the slide started from
    pub source_note: Option<u8>,
}

impl PitchSlide {
    /// Start a slide with precomputed parameters
    pub fn start(&mut self, pitch: i32, step: i32, source_note: u8) {
        self.pitch = pitch;
        self.step = step;
        self.source_note = Some(source_note);
    }

    /// Apply slide for one frame
    ///
    /// Once the offset reaches zero or ends up on the same side as the step
    /// the slide is complete and both values are cleared.
    pub fn apply_slide(&mut self) {
        if self.step == 0 {
            return;
        }
        self.pitch += self.step;
        if self.pitch == 0 || self.pitch.signum() == self.step.signum() {
            self.pitch = 0;
            self.step = 0;
        }
    }

    /// Slide in progress
    pub fn is_active(&self) -> bool {
        self.step != 0
    }

    /// Reset
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Parameters of a slide computed when the row is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideParams {
    /// Initial offset
    pub pitch: i32,
    /// Offset change per frame
    pub step: i32,
    /// Note the slide starts from
    pub source_note: u8,
}

impl SlideParams {
    /// Slide from `from_period` to `to_period` over `frames` frames.
    pub fn new(
        from_period: u16,
        to_period: u16,
        slide_shift: u8,
        frames: u32,
        source_note: u8,
    ) -> Self {
        let pitch = (from_period as i32 - to_period as i32) << slide_shift;
        Self {
            pitch,
            step: step_towards(-pitch, frames),
            source_note,
        }
    }
}

/// State for volume slide effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSlide {
    /// Current volume, fixed point
    pub volume: i32,
    /// Volume change per frame, fixed point
    pub step: i32,
    /// Slide target, fixed point
    pub target: i32,
}

impl Default for VolumeSlide {
    fn default() -> Self {
        Self::new(15)
    }
}

impl VolumeSlide {
    /// Create with initial volume
    pub fn new(initial_volume: u8) -> Self {
        let volume = (initial_volume.min(15) as i32) << VOLUME_FRAC_BITS;
        Self {
            volume,
            step: 0,
            target: volume,
        }
    }

    /// Set volume directly, cancelling any slide
    pub fn set(&mut self, volume: u8) {
        *self = Self::new(volume);
    }

    /// Start sliding to `target` with a precomputed step
    pub fn slide_to(&mut self, target: u8, step: i32) {
        self.target = (target.min(15) as i32) << VOLUME_FRAC_BITS;
        self.step = step;
    }

    /// Apply slide for one frame, snapping to the target on overshoot
    pub fn apply_slide(&mut self) {
        if self.step == 0 {
            return;
        }
        self.volume += self.step;
        if (self.step > 0 && self.volume >= self.target)
            || (self.step < 0 && self.volume <= self.target)
        {
            self.volume = self.target;
            self.step = 0;
        }
    }

    /// Integer volume 0..=15
    pub fn get(&self) -> u8 {
        (self.volume >> VOLUME_FRAC_BITS).clamp(0, 15) as u8
    }

    /// Per-frame step sliding from `from` to `to` over `frames` frames
    pub fn step_for(from: u8, to: u8, frames: u32) -> i32 {
        step_towards(((to as i32) - (from as i32)) << VOLUME_FRAC_BITS, frames)
    }
}

/// `delta / frames`, at least one unit in the direction of `delta`.
fn step_towards(delta: i32, frames: u32) -> i32 {
    if delta == 0 {
        return 0;
    }
    let step = delta / frames.max(1) as i32;
    if step == 0 {
        delta.signum()
    } else {
        step
    }
}
