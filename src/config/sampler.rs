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
use std::path::Path;
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::samples::{
    NoteOffBehavior, SampleLoader, SamplerSettings, DEFAULT_EXTENSIONS, DEFAULT_VOLUME_RAMP,
};

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BLOCK_SIZE: usize = 512;
const DEFAULT_OUTPUT_CHANNELS: u16 = 4;

/// A YAML representation of the sampler configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct SamplerConfig {
    /// Engine sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Frames per rendered block (default: 512).
    block_size: Option<usize>,

    /// Number of output channels (default: 4).
    output_channels: Option<u16>,

    /// File extensions to load (default: ["wav"]).
    extensions: Option<Vec<String>>,

    /// Whether sub-folders are scanned (default: true).
    recursive: Option<bool>,

    /// Whether recordings are converted to the engine sample rate (default: true).
    resample: Option<bool>,

    /// Initial volume in dB (default: 0.0).
    volume_db: Option<f32>,

    /// Gain smoothing time, e.g. "20ms" (default: 20ms).
    volume_ramp: Option<String>,

    /// What a Note Off does (default: play_to_completion).
    note_off: Option<NoteOffBehavior>,
}

impl SamplerConfig {
    /// Parse a sampler configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<SamplerConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<SamplerConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but make no sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == Some(0) {
            return Err(ConfigError::Invalid {
                field: "sample_rate",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.block_size == Some(0) {
            return Err(ConfigError::Invalid {
                field: "block_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.output_channels == Some(0) {
            return Err(ConfigError::Invalid {
                field: "output_channels",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.extensions.as_ref().is_some_and(|e| e.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "extensions",
                reason: "must list at least one extension".to_string(),
            });
        }
        if self.volume_db.is_some_and(|db| !db.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "volume_db",
                reason: "must be a finite number".to_string(),
            });
        }
        self.volume_ramp()?;
        Ok(())
    }

    /// Returns the engine sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the frames per rendered block (default: 512).
    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    /// Returns the number of output channels (default: 4).
    pub fn output_channels(&self) -> u16 {
        self.output_channels.unwrap_or(DEFAULT_OUTPUT_CHANNELS)
    }

    /// Returns the extensions to load.
    pub fn extensions(&self) -> Vec<String> {
        match &self.extensions {
            Some(extensions) => extensions.clone(),
            None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn recursive(&self) -> bool {
        self.recursive.unwrap_or(true)
    }

    pub fn resample(&self) -> bool {
        self.resample.unwrap_or(true)
    }

    /// Returns the initial volume in dB (default: 0.0).
    pub fn volume_db(&self) -> f32 {
        self.volume_db.unwrap_or(0.0)
    }

    /// Returns the gain smoothing time (default: 20ms).
    pub fn volume_ramp(&self) -> Result<Duration, ConfigError> {
        match &self.volume_ramp {
            Some(volume_ramp) => Ok(DurationString::from_string(volume_ramp.clone())
                .map_err(|e| ConfigError::InvalidDuration {
                    value: volume_ramp.clone(),
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_VOLUME_RAMP),
        }
    }

    /// Returns the Note Off behavior (default: play_to_completion).
    pub fn note_off(&self) -> NoteOffBehavior {
        self.note_off.unwrap_or_default()
    }

    /// Builds the runtime sampler settings.
    pub fn settings(&self) -> Result<SamplerSettings, ConfigError> {
        Ok(SamplerSettings {
            sample_rate: self.sample_rate(),
            volume_db: self.volume_db(),
            volume_ramp: self.volume_ramp()?,
            note_off: self.note_off(),
        })
    }

    /// Builds a loader matching this configuration.
    pub fn loader(&self) -> SampleLoader {
        SampleLoader::new(self.sample_rate())
            .with_extensions(self.extensions())
            .with_recursive(self.recursive())
            .with_resample(self.resample())
    }
}
