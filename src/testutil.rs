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
use std::{error::Error, fs::File, path::PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::samples::Recording;

/// Writes planar samples (one Vec per channel) to a WAV file.
pub fn write_wav<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    write_wav_with_bits(path, samples, sample_rate, 32)
}

pub fn write_wav_with_bits<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    // Determine sample format based on the type
    let sample_format = if std::any::TypeId::of::<S>() == std::any::TypeId::of::<f32>() {
        SampleFormat::Float
    } else if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i32>()
        || std::any::TypeId::of::<S>() == std::any::TypeId::of::<i16>()
    {
        SampleFormat::Int
    } else {
        return Err("Unsupported sample format".into());
    };

    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample,
            sample_format,
        },
    )?;

    let frames = samples.iter().map(|c| c.len()).min().unwrap_or(0);
    for frame in 0..frames {
        for channel_samples in &samples {
            writer.write_sample(channel_samples[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Writes a mono 16-bit PCM WAV whose header declares a sample rate of zero.
pub fn write_zero_rate_wav(path: PathBuf) -> Result<(), Box<dyn Error>> {
    let data: Vec<u8> = [0i16, 1000, -1000, 0]
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // channels
    bytes.extend_from_slice(&0u32.to_le_bytes()); // sample rate
    bytes.extend_from_slice(&0u32.to_le_bytes()); // byte rate
    bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&data);

    std::fs::write(path, bytes)?;
    Ok(())
}

/// Builds an in-memory recording where every sample of every channel is `value`.
pub fn constant_recording(name: &str, channels: usize, frames: usize, value: f32) -> Recording {
    Recording::new(name.to_string(), vec![vec![value; frames]; channels], 44100)
}

/// Builds an in-memory recording whose samples count up from 1.0 on each channel, with
/// channel `n` offset by `n * 1000.0`. Handy for checking exactly which frame was read.
pub fn ramp_recording(name: &str, channels: usize, frames: usize) -> Recording {
    let data = (0..channels)
        .map(|ch| {
            (0..frames)
                .map(|i| (ch * 1000) as f32 + (i + 1) as f32)
                .collect()
        })
        .collect();
    Recording::new(name.to_string(), data, 44100)
}

/// Audio test utilities for validating results
pub mod audio_test_utils {
    /// Returns true if every sample is exactly zero.
    pub fn is_silent(samples: &[f32]) -> bool {
        samples.iter().all(|&s| s == 0.0)
    }
}
