//! Song traversal interface.
//!
//! The driver only needs to read notes and to look ahead a few rows; the
//! storage behind [`SongSource`] is the caller's business. [`LinearSong`] is a
//! small in-memory implementation.

use std::collections::BTreeMap;

use crate::channel_type::ChannelType;
use crate::note::Note;

/// Position of a row: pattern index and row inside the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NoteLocation {
    /// Pattern index in the song order.
    pub pattern: usize,
    /// Row inside the pattern.
    pub row: usize,
}

impl NoteLocation {
    /// Location at `pattern`, `row`.
    pub fn new(pattern: usize, row: usize) -> Self {
        Self { pattern, row }
    }
}

/// Read-only song access used by `advance`.
pub trait SongSource {
    /// Note stored at `location` for `channel`.
    fn note_at(&self, channel: ChannelType, location: NoteLocation) -> Option<Note>;

    /// Location `rows` rows after `location`, `None` past the end of the song.
    fn advance_location(&self, location: NoteLocation, rows: u32) -> Option<NoteLocation>;

    /// Frames between `location` and the next note of `channel` at `speed`.
    fn frames_until_next_note(
        &self,
        channel: ChannelType,
        location: NoteLocation,
        speed: u8,
    ) -> u32;
}

/// In-memory song with fixed-length patterns and a constant row speed.
#[derive(Debug, Clone, Default)]
pub struct LinearSong {
    pattern_length: usize,
    pattern_count: usize,
    notes: BTreeMap<(ChannelType, usize), Note>,
}

impl LinearSong {
    /// Song of `pattern_count` patterns of `pattern_length` rows.
    pub fn new(pattern_length: usize, pattern_count: usize) -> Self {
        Self {
            pattern_length: pattern_length.max(1),
            pattern_count,
            notes: BTreeMap::new(),
        }
    }

    /// Total rows.
    pub fn row_count(&self) -> usize {
        self.pattern_length * self.pattern_count
    }

    /// Location of an absolute row.
    pub fn location(&self, row: usize) -> NoteLocation {
        NoteLocation::new(row / self.pattern_length, row % self.pattern_length)
    }

    /// Place `note` at an absolute row.
    pub fn set_note(&mut self, channel: ChannelType, row: usize, note: Note) {
        self.notes.insert((channel, row), note);
    }

    /// Builder form of [`LinearSong::set_note`].
    pub fn with_note(mut self, channel: ChannelType, row: usize, note: Note) -> Self {
        self.set_note(channel, row, note);
        self
    }

    fn absolute(&self, location: NoteLocation) -> usize {
        location.pattern * self.pattern_length + location.row
    }
}

impl SongSource for LinearSong {
    fn note_at(&self, channel: ChannelType, location: NoteLocation) -> Option<Note> {
        self.notes.get(&(channel, self.absolute(location))).cloned()
    }

    fn advance_location(&self, location: NoteLocation, rows: u32) -> Option<NoteLocation> {
        let row = self.absolute(location) + rows as usize;
        (row < self.row_count()).then(|| self.location(row))
    }

    fn frames_until_next_note(
        &self,
        channel: ChannelType,
        location: NoteLocation,
        speed: u8,
    ) -> u32 {
        let start = self.absolute(location);
        let next = self
            .notes
            .range((channel, start + 1)..)
            .take_while(|((c, _), _)| *c == channel)
            .find(|(_, note)| !note.is_empty())
            .map(|((_, row), _)| *row)
            .unwrap_or(self.row_count());
        (next.saturating_sub(start) as u32 * speed as u32).max(1)
    }
}
