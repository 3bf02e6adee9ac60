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

//! Splits the sampler into a control side and a render side.
//!
//! The [`SamplerHandle`] lives on the control thread. It loads libraries and sets the
//! volume. The [`SamplerProcessor`] lives on the audio thread and renders blocks. The two
//! share only an `ArcSwap` holding the current library snapshot and an atomic holding the
//! volume target, so the render side never waits on the control side.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::dispatch::{NoteOffBehavior, TriggerDispatcher, TriggerEvent};
use super::engine::{BlockOutcome, EngineState, PlaybackCursor, PlaybackEngine};
use super::error::LoadError;
use super::library::SampleLibrary;
use super::loader::{LoadReport, SampleLoader};
use super::ramp::{db_to_gain, VolumeRamp};

/// Quietest volume accepted by [`SamplerHandle::set_volume_db`].
pub const MIN_VOLUME_DB: f32 = -60.0;

/// Loudest volume accepted by [`SamplerHandle::set_volume_db`].
pub const MAX_VOLUME_DB: f32 = 20.0;

/// Default gain smoothing time.
pub const DEFAULT_VOLUME_RAMP: Duration = Duration::from_millis(20);

/// Runtime settings for a sampler.
#[derive(Debug, Clone)]
pub struct SamplerSettings {
    /// Engine sample rate in Hz.
    pub sample_rate: u32,
    /// Initial volume in dB.
    pub volume_db: f32,
    /// How long gain changes take to settle.
    pub volume_ramp: Duration,
    /// What a Note Off does.
    pub note_off: NoteOffBehavior,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            volume_db: 0.0,
            volume_ramp: DEFAULT_VOLUME_RAMP,
            note_off: NoteOffBehavior::default(),
        }
    }
}

/// State shared by the handle and the processor.
struct Shared {
    library: ArcSwap<SampleLibrary>,
    /// Target volume in dB, stored as f32 bits.
    volume_db: AtomicU32,
}

/// Constructor for a handle/processor pair.
pub struct Sampler;

impl Sampler {
    /// Creates a handle and processor sharing an empty library.
    pub fn new(settings: &SamplerSettings) -> (SamplerHandle, SamplerProcessor) {
        let volume_db = clamp_volume_db(settings.volume_db);
        let shared = Arc::new(Shared {
            library: ArcSwap::from_pointee(SampleLibrary::new()),
            volume_db: AtomicU32::new(volume_db.to_bits()),
        });

        let handle = SamplerHandle {
            shared: shared.clone(),
            retired: Arc::new(Mutex::new(Vec::new())),
            sample_rate: settings.sample_rate,
        };
        let processor = SamplerProcessor {
            shared,
            dispatcher: TriggerDispatcher::new(settings.note_off),
            engine: PlaybackEngine::new(),
            ramp: VolumeRamp::new(db_to_gain(volume_db)),
            applied_volume_bits: volume_db.to_bits(),
            volume_ramp: settings.volume_ramp,
            sample_rate: settings.sample_rate,
        };

        (handle, processor)
    }
}

/// Control-side handle. Cheap to clone.
#[derive(Clone)]
pub struct SamplerHandle {
    shared: Arc<Shared>,
    /// Replaced libraries the audio thread may still be reading. Each is dropped here,
    /// on a later publish, once nothing else refers to it, so the audio thread never
    /// frees a library.
    retired: Arc<Mutex<Vec<Arc<SampleLibrary>>>>,
    sample_rate: u32,
}

impl SamplerHandle {
    /// Loads every matching file in `path` with the given loader and publishes the result,
    /// replacing the current library. If the folder cannot be read nothing is published and
    /// the current library stays in place.
    pub fn load_folder(&self, loader: &SampleLoader, path: &Path) -> Result<LoadReport, LoadError> {
        let (library, report) = loader.load_folder(path)?;
        self.publish(library);
        Ok(report)
    }

    /// Publishes a library. The audio thread sees it from its next block onwards.
    pub fn publish(&self, library: SampleLibrary) {
        let keys = library.len();
        let memory_kb = library.total_memory_usage() / 1024;
        let library = Arc::new(library);

        // Swap and retire under one lock so concurrent publishes retire in order.
        let mut retired = self.retired.lock();
        let previous = self.shared.library.swap(library);
        retired.push(previous);
        // Only libraries nobody else holds are freed; a render guard keeps its library.
        retired.retain(|library| Arc::strong_count(library) > 1);
        let pending = retired.len();
        drop(retired);

        info!(keys, memory_kb, pending, "Sample library published");
    }

    /// Returns the currently published library.
    pub fn library(&self) -> Arc<SampleLibrary> {
        self.shared.library.load_full()
    }

    /// Sets the target volume in dB. Values are clamped to the supported range; the
    /// processor ramps to the new level from its next block.
    pub fn set_volume_db(&self, db: f32) {
        let clamped = clamp_volume_db(db);
        if clamped != db {
            debug!(requested = db, clamped, "Volume clamped");
        }
        self.shared
            .volume_db
            .store(clamped.to_bits(), Ordering::Release);
    }

    /// Returns the target volume in dB.
    pub fn volume_db(&self) -> f32 {
        f32::from_bits(self.shared.volume_db.load(Ordering::Acquire))
    }

    /// Returns the engine sample rate the handle was created for.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl std::fmt::Debug for SamplerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let library = self.shared.library.load();
        f.debug_struct("SamplerHandle")
            .field("keys", &library.len())
            .field("memory_kb", &(library.total_memory_usage() / 1024))
            .field("volume_db", &self.volume_db())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Render-side half. Owns all playback state; meant to be moved onto the audio thread.
pub struct SamplerProcessor {
    shared: Arc<Shared>,
    dispatcher: TriggerDispatcher,
    engine: PlaybackEngine,
    ramp: VolumeRamp,
    /// Volume bits last handed to the ramp.
    applied_volume_bits: u32,
    volume_ramp: Duration,
    sample_rate: u32,
}

impl SamplerProcessor {
    /// Renders one block. Events are applied in order before any audio is written, then
    /// every sample of `output` is filled.
    ///
    /// Does not allocate, lock, block or log.
    pub fn process<C: AsMut<[f32]>>(
        &mut self,
        output: &mut [C],
        events: &[TriggerEvent],
    ) -> BlockOutcome {
        self.dispatcher.dispatch(events, self.engine.cursor_mut());

        let volume_bits = self.shared.volume_db.load(Ordering::Acquire);
        if volume_bits != self.applied_volume_bits {
            self.applied_volume_bits = volume_bits;
            let gain = db_to_gain(f32::from_bits(volume_bits));
            self.ramp
                .set_target(gain, self.volume_ramp, self.sample_rate);
        }

        let library = self.shared.library.load();
        self.engine.render(&library, &mut self.ramp, output)
    }

    /// Returns the coarse engine state.
    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    /// Returns the playback cursor.
    pub fn cursor(&self) -> &PlaybackCursor {
        self.engine.cursor()
    }

    /// Returns the current linear gain.
    pub fn gain(&self) -> f32 {
        self.ramp.current()
    }

    /// Returns the engine sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stops playback and returns to idle.
    pub fn reset(&mut self) {
        self.engine.reset();
    }
}

impl std::fmt::Debug for SamplerProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerProcessor")
            .field("cursor", self.engine.cursor())
            .field("gain", &self.ramp.current())
            .field("note_off", &self.dispatcher.note_off())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

fn clamp_volume_db(db: f32) -> f32 {
    if db.is_nan() {
        return 0.0;
    }
    db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB)
}
