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

//! Whole-file decoding into planar f32 buffers.
//!
//! Files are decoded once, up front, so nothing here is ever called from the
//! render path.

use std::fs::File;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::samples::Recording;

/// Error types for audio decoding.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("'{path}': {reason}")]
    Unsupported { path: String, reason: String },

    #[error("'{0}': no audio track found")]
    NoAudioTrack(String),

    #[error("'{0}': sample rate missing or zero")]
    MissingSampleRate(String),

    #[error("'{path}': channel count changed mid-stream ({expected} -> {found})")]
    ChannelCountChanged {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("'{path}': decoder panicked: {reason}")]
    Panicked { path: String, reason: String },

    #[error("Audio file error: {0}")]
    AudioError(#[from] SymphoniaError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Decodes the given file completely into a planar [`Recording`].
/// Supports WAV, FLAC, MP3, Ogg/Vorbis and anything else symphonia can probe.
///
/// A panic inside the decoder (symphonia asserts on some malformed headers) is caught and
/// returned as [`DecodeError::Panicked`].
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<Recording, DecodeError> {
    let path = path.as_ref();
    panic::catch_unwind(AssertUnwindSafe(|| decode(path))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(DecodeError::Panicked {
            path: path.display().to_string(),
            reason,
        })
    })
}

fn decode(path: &Path) -> Result<Recording, DecodeError> {
    let path_str = path.display().to_string();

    // Include the path in the error so the user can see which file failed.
    let file = File::open(path).map_err(|e| {
        DecodeError::IoError(std::io::Error::new(e.kind(), format!("{}: {}", path_str, e)))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Unsupported {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::NoAudioTrack(path_str.clone()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params
        .sample_rate
        .filter(|&rate| rate > 0)
        .ok_or_else(|| DecodeError::MissingSampleRate(path_str.clone()))?;

    let mut decoder = get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

    // Channel count from the container if it is known, otherwise from the first
    // decoded buffer.
    let mut channels: Vec<Vec<f32>> = match params.channels {
        Some(layout) => vec![Vec::new(); layout.count()],
        None => Vec::new(),
    };
    if let Some(n_frames) = params.n_frames {
        for channel in channels.iter_mut() {
            channel.reserve(n_frames as usize);
        }
    }

    while let Some(packet) = read_next_packet(format_reader.as_mut(), decoder.as_mut())? {
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // A corrupt packet is dropped; the rest of the stream is still usable.
                debug!(path = path_str.as_str(), error = e, "Skipping undecodable packet");
                continue;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                decoder.decode(&packet)?
            }
            Err(e) => return Err(DecodeError::AudioError(e)),
        };
        append_decoded(decoded, &mut channels, &path_str)?;
    }

    let name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
        .to_string();

    Ok(Recording::new(name, channels, sample_rate))
}

/// Reads the next packet, treating end of stream as `None`. Resets the decoder when the
/// format reader asks for it.
fn read_next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
) -> Result<Option<Packet>, DecodeError> {
    loop {
        match format_reader.next_packet() {
            Ok(packet) => return Ok(Some(packet)),
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            // Some readers report a decode error at EOF instead of an IO error.
            Err(SymphoniaError::DecodeError(_)) => return Ok(None),
            Err(e) => return Err(DecodeError::AudioError(e)),
        }
    }
}

/// Appends a decoded buffer of any sample type to the planar output.
fn append_decoded(
    decoded: AudioBufferRef,
    channels: &mut Vec<Vec<f32>>,
    path: &str,
) -> Result<(), DecodeError> {
    match decoded {
        AudioBufferRef::F32(buf) => append_planar(&buf, channels, path, |s| s),
        AudioBufferRef::F64(buf) => append_planar(&buf, channels, path, |s| s as f32),
        AudioBufferRef::S8(buf) => append_planar(&buf, channels, path, scale_s8),
        AudioBufferRef::S16(buf) => append_planar(&buf, channels, path, scale_s16),
        AudioBufferRef::S24(buf) => {
            append_planar(&buf, channels, path, |s| scale_s24(s.inner()))
        }
        AudioBufferRef::S32(buf) => append_planar(&buf, channels, path, scale_s32),
        AudioBufferRef::U8(buf) => append_planar(&buf, channels, path, scale_u8),
        AudioBufferRef::U16(buf) => append_planar(&buf, channels, path, scale_u16),
        AudioBufferRef::U24(buf) => {
            append_planar(&buf, channels, path, |s| scale_u24(s.inner()))
        }
        AudioBufferRef::U32(buf) => append_planar(&buf, channels, path, scale_u32),
    }
}

fn append_planar<T, F>(
    buf: &AudioBuffer<T>,
    channels: &mut Vec<Vec<f32>>,
    path: &str,
    convert: F,
) -> Result<(), DecodeError>
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let count = buf.spec().channels.count();
    if buf.frames() == 0 {
        return Ok(());
    }
    if channels.is_empty() {
        channels.resize(count, Vec::new());
    } else if channels.len() != count {
        return Err(DecodeError::ChannelCountChanged {
            path: path.to_string(),
            expected: channels.len(),
            found: count,
        });
    }

    for (plane, channel) in buf.planes().planes().iter().zip(channels.iter_mut()) {
        channel.extend(plane.iter().map(|&sample| convert(sample)));
    }
    Ok(())
}

// Scaling helpers for the integer formats. Signed formats divide by 2^(bits - 1),
// unsigned formats are mapped from [0, max] onto [-1.0, 1.0].

#[inline]
pub(crate) fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
pub(crate) fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
pub(crate) fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
pub(crate) fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
pub(crate) fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}
