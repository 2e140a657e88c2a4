//! Per-channel view of one envelope.

use std::sync::Arc;

use crate::envelope::{Envelope, EnvelopeCursor, EnvelopeKind};

/// Shared envelope reference plus this channel's position inside it.
#[derive(Debug, Clone)]
pub struct EnvelopeSlot {
    kind: EnvelopeKind,
    envelope: Option<Arc<Envelope>>,
    cursor: EnvelopeCursor,
    value: i32,
    repeat_hold: i32,
}

impl EnvelopeSlot {
    pub(crate) fn new(kind: EnvelopeKind) -> Self {
        Self {
            kind,
            envelope: None,
            cursor: EnvelopeCursor::NotStarted,
            value: kind.default_value(),
            repeat_hold: 0,
        }
    }

    /// Envelope kind of this slot.
    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    /// Envelope currently bound.
    pub fn envelope(&self) -> Option<&Arc<Envelope>> {
        self.envelope.as_ref()
    }

    /// Cursor.
    pub fn cursor(&self) -> EnvelopeCursor {
        self.cursor
    }

    /// Last value read.
    pub fn value(&self) -> i32 {
        self.value
    }

    /// Frames left before a waveform-repeat slot advances.
    pub fn repeat_hold(&self) -> i32 {
        self.repeat_hold
    }

    /// Bind `envelope`; it starts on the next attack.
    pub(crate) fn bind(&mut self, envelope: Option<Arc<Envelope>>) {
        self.envelope = envelope;
        self.cursor = EnvelopeCursor::NotStarted;
        self.value = self.neutral_value();
        self.repeat_hold = 0;
    }

    /// Bind `envelope` and start it immediately.
    pub(crate) fn install(&mut self, envelope: Arc<Envelope>) {
        self.bind(Some(envelope));
        self.restart();
    }

    /// Rewind to the first value.
    pub(crate) fn restart(&mut self) {
        self.cursor = EnvelopeCursor::Active(0);
        self.value = self.neutral_value();
        self.repeat_hold = 0;
    }

    /// Jump to the release point, if the envelope has one.
    pub(crate) fn release(&mut self) {
        let Some(release) = self.envelope.as_ref().and_then(|e| e.release_point()) else {
            return;
        };
        if let EnvelopeCursor::Active(_) = self.cursor {
            self.cursor = EnvelopeCursor::Active(release);
            self.repeat_hold = 0;
        }
    }

    /// Read the current value and move the cursor.
    pub(crate) fn step(&mut self, released: bool) {
        let Some(env) = self.envelope.clone() else {
            return;
        };
        let EnvelopeCursor::Active(index) = self.cursor else {
            return;
        };
        if env.is_empty() {
            return;
        }
        let index = index.min(env.len() - 1);

        if self.kind == EnvelopeKind::WaveformRepeat {
            if self.repeat_hold <= 0 {
                self.repeat_hold = (env.value(index) as i32).max(1);
            }
            self.value = index as i32;
            self.repeat_hold -= 1;
            if self.repeat_hold == 0 {
                self.cursor = next_cursor(&env, index, released);
            }
            return;
        }

        let v = env.value(index) as i32;
        self.value = if env.is_relative() { self.value + v } else { v };
        self.cursor = next_cursor(&env, index, released);
    }

    fn neutral_value(&self) -> i32 {
        match &self.envelope {
            Some(env) if env.is_relative() => 0,
            _ => self.kind.default_value(),
        }
    }
}

/// Cursor after reading `index`.
fn next_cursor(env: &Envelope, index: usize, released: bool) -> EnvelopeCursor {
    let next = index + 1;
    if let Some(release) = env.release_point() {
        if next == release && !released {
            return EnvelopeCursor::Active(env.loop_point().unwrap_or(index));
        }
    }
    if next >= env.len() {
        return match (env.loop_point(), env.release_point()) {
            (Some(lp), None) => EnvelopeCursor::Active(lp),
            _ if env.is_relative() => EnvelopeCursor::Finished,
            _ => EnvelopeCursor::Active(env.len() - 1),
        };
    }
    EnvelopeCursor::Active(next)
}
