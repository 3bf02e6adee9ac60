// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decoded recordings and the key-indexed library that owns them.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Integer key a recording is triggered by. For MIDI input this is the note number.
pub type Key = u32;

/// Highest key reachable from a MIDI note event.
pub const MAX_MIDI_KEY: Key = 127;

/// A fully decoded recording held in planar format (one Vec per channel).
/// Immutable once constructed.
#[derive(Clone, PartialEq)]
pub struct Recording {
    /// Display name, usually the file name it was decoded from.
    name: String,
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl Recording {
    /// Creates a new recording. Channels are truncated to the shortest one so every
    /// channel has the same length.
    pub fn new(name: String, mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        for channel in channels.iter_mut() {
            channel.truncate(frames);
        }
        Self {
            name,
            channels,
            sample_rate,
        }
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    /// Returns the number of channels.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns the sample rate of the audio data.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the samples of one channel.
    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    /// Returns all channels.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Returns the playback duration at the recording's own sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.channels.iter().map(|c| c.len()).sum::<usize>() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for Recording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recording")
            .field("name", &self.name)
            .field("channels", &self.channel_count())
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Key-indexed collection of recordings. Populated by a bulk load and read-only
/// afterwards; a new load produces a new library rather than mutating this one.
#[derive(Default, Debug)]
pub struct SampleLibrary {
    recordings: HashMap<Key, Recording>,
}

impl SampleLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a recording, replacing and returning any recording already under `key`.
    pub fn insert(&mut self, key: Key, recording: Recording) -> Option<Recording> {
        self.recordings.insert(key, recording)
    }

    /// Looks up the recording for a key.
    #[inline]
    pub fn get(&self, key: Key) -> Option<&Recording> {
        self.recordings.get(&key)
    }

    /// Returns whether a recording exists for the key.
    pub fn contains(&self, key: Key) -> bool {
        self.recordings.contains_key(&key)
    }

    /// Returns the number of recordings.
    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    /// Returns true if no recordings are loaded.
    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    /// Returns all keys in ascending order.
    pub fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.recordings.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Iterates over all entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (Key, &Recording)> {
        self.recordings.iter().map(|(key, recording)| (*key, recording))
    }

    /// Returns the total memory used by all recordings.
    pub fn total_memory_usage(&self) -> usize {
        self.recordings.values().map(|r| r.memory_size()).sum()
    }
}

/// Derives a key from the trailing integer of a file's stem, e.g. `Choir_C4_60.wav` -> 60.
/// Returns `None` if the stem does not end in a digit or the number does not fit in a key.
pub fn key_from_path(path: &Path) -> Option<Key> {
    let stem = path.file_stem()?.to_str()?;
    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    stem[digits_start..].parse().ok()
}
