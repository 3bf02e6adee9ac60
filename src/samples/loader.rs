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

//! Bulk loading of a folder of recordings into a [`SampleLibrary`].
//!
//! Recordings are decoded entirely into memory up front so playback never touches disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::error::LoadError;
use super::library::{key_from_path, Key, Recording, SampleLibrary, MAX_MIDI_KEY};
use crate::audio::decode::{decode_file, DecodeError};
use crate::util::filename_display;

/// Extensions loaded when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["wav"];

/// Summary of a folder load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Number of recordings in the resulting library.
    pub loaded: usize,
    /// Files skipped because their name has no trailing key.
    pub skipped_names: Vec<PathBuf>,
    /// Files that failed to decode.
    pub failed: Vec<PathBuf>,
    /// Files whose key was taken again by a later file in the same load.
    pub overridden: Vec<PathBuf>,
}

/// Loads folders of audio files into libraries.
pub struct SampleLoader {
    /// Target sample rate for resampling (matches the engine).
    target_sample_rate: u32,
    /// Lowercase extensions to match, without the dot.
    extensions: Vec<String>,
    /// Whether sub-folders are scanned.
    recursive: bool,
    /// Whether recordings at another sample rate are converted.
    resample: bool,
}

impl SampleLoader {
    /// Creates a new sample loader with the default extension filter.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            recursive: true,
            resample: true,
        }
    }

    /// Sets the extensions to load. Matching is case-insensitive and a leading dot is ignored.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Sets whether sub-folders are scanned.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Sets whether recordings are converted to the target sample rate.
    pub fn with_resample(mut self, resample: bool) -> Self {
        self.resample = resample;
        self
    }

    /// Loads every matching file in the folder into a new library. Files without a
    /// trailing key or that fail to decode are skipped. Only a folder that cannot be read
    /// at all is an error.
    pub fn load_folder(&self, path: &Path) -> Result<(SampleLibrary, LoadReport), LoadError> {
        info!(path = ?path, "Loading sample folder");

        let files = self.find_files(path)?;
        let mut report = LoadReport::default();

        let mut keyed = Vec::with_capacity(files.len());
        for file in files {
            match key_from_path(&file) {
                Some(key) => keyed.push((file, key)),
                None => {
                    warn!(path = ?file, "Skipping file without a trailing note number");
                    report.skipped_names.push(file);
                }
            }
        }

        let decoded: Vec<(PathBuf, Key, Result<Recording, DecodeError>)> = keyed
            .into_par_iter()
            .map(|(file, key)| {
                let result = self.load_file(&file);
                (file, key, result)
            })
            .collect();

        let mut library = SampleLibrary::new();
        let mut sources: HashMap<Key, PathBuf> = HashMap::new();
        for (file, key, result) in decoded {
            let recording = match result {
                Ok(recording) => recording,
                Err(e) => {
                    warn!(path = ?file, error = %e, "Failed to load sample, skipping");
                    report.failed.push(file);
                    continue;
                }
            };

            if key > MAX_MIDI_KEY {
                warn!(path = ?file, key, "Key is outside the MIDI note range");
            }

            if let Some(previous) = sources.insert(key, file.clone()) {
                warn!(
                    key,
                    previous = filename_display(&previous),
                    replacement = filename_display(&file),
                    "Two files map to the same key, keeping the later one"
                );
                report.overridden.push(previous);
            }

            debug!(
                key,
                name = recording.name(),
                channels = recording.channel_count(),
                frames = recording.frames(),
                "Sample loaded"
            );
            library.insert(key, recording);
        }

        report.loaded = library.len();
        info!(
            path = ?path,
            loaded = report.loaded,
            skipped = report.skipped_names.len(),
            failed = report.failed.len(),
            memory_kb = library.total_memory_usage() / 1024,
            "Sample folder loaded"
        );

        Ok((library, report))
    }

    /// Decodes a single file, converting its sample rate if needed.
    pub fn load_file(&self, path: &Path) -> Result<Recording, DecodeError> {
        let recording = decode_file(path)?;
        let source_rate = recording.sample_rate();

        if source_rate == self.target_sample_rate || recording.frames() == 0 {
            return Ok(recording);
        }

        if !self.resample {
            warn!(
                path = ?path,
                source_rate,
                target_rate = self.target_sample_rate,
                "Sample rate differs from the engine and resampling is disabled"
            );
            return Ok(recording);
        }

        info!(
            path = ?path,
            source_rate,
            target_rate = self.target_sample_rate,
            "Transcoding sample"
        );
        let channels = recording
            .channels()
            .iter()
            .map(|channel| transcode_samples(channel, source_rate, self.target_sample_rate))
            .collect();
        Ok(Recording::new(
            recording.name().to_string(),
            channels,
            self.target_sample_rate,
        ))
    }

    /// Returns the matching files under `path`, sorted by path.
    pub fn find_files(&self, path: &Path) -> Result<Vec<PathBuf>, LoadError> {
        if !path.is_dir() {
            return Err(LoadError::NotADirectory(path.to_path_buf()));
        }

        let mut files = Vec::new();
        let mut pending = vec![path.to_path_buf()];
        let mut is_root = true;

        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(source) if is_root => {
                    return Err(LoadError::ReadDir { path: dir, source });
                }
                Err(e) => {
                    warn!(path = ?dir, error = %e, "Unable to read folder, skipping");
                    continue;
                }
            };
            is_root = false;

            for entry in entries {
                let entry_path = match entry {
                    Ok(entry) => entry.path(),
                    Err(e) => {
                        warn!(path = ?dir, error = %e, "Unable to read folder entry");
                        continue;
                    }
                };

                if entry_path.is_dir() {
                    if self.recursive {
                        pending.push(entry_path);
                    }
                } else if self.matches_extension(&entry_path) {
                    files.push(entry_path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("target_sample_rate", &self.target_sample_rate)
            .field("extensions", &self.extensions)
            .field("recursive", &self.recursive)
            .field("resample", &self.resample)
            .finish()
    }
}

/// Converts one channel between sample rates using linear interpolation. Good enough for
/// one-shots; nothing here runs in real time.
fn transcode_samples(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    // Integer ceiling so exact ratios never gain a spurious trailing frame.
    let target_frames =
        (samples.len() as u64 * target_rate as u64).div_ceil(source_rate as u64) as usize;

    (0..target_frames)
        .map(|target_frame| {
            let source_pos = target_frame as f64 / ratio;
            let source_frame = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            let s0 = samples.get(source_frame).copied().unwrap_or(0.0);
            let s1 = samples.get(source_frame + 1).copied().unwrap_or(s0);
            s0 + (s1 - s0) * frac
        })
        .collect()
}
