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

//! MIDI-triggered, monophonic sample playback.
//!
//! This module provides:
//! - Folder loading into an in-memory, key-indexed library
//! - Note On/Note Off dispatch
//! - The block renderer with smoothed gain
//! - The control/render split used to drive it from two threads

mod dispatch;
mod engine;
mod error;
mod library;
mod loader;
mod ramp;
mod sampler;

pub use dispatch::{NoteOffBehavior, TriggerDispatcher, TriggerEvent};
pub use engine::{BlockOutcome, EngineState, PlaybackCursor, PlaybackEngine};
pub use error::LoadError;
pub use library::{key_from_path, Key, Recording, SampleLibrary, MAX_MIDI_KEY};
pub use loader::{LoadReport, SampleLoader, DEFAULT_EXTENSIONS};
pub use ramp::{db_to_gain, VolumeRamp};
pub use sampler::{
    Sampler, SamplerHandle, SamplerProcessor, SamplerSettings, DEFAULT_VOLUME_RAMP,
    MAX_VOLUME_DB, MIN_VOLUME_DB,
};
