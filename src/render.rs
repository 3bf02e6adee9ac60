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

//! Offline rendering: drives a processor block by block from a timed event list.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info, warn};

use crate::midi::TimedTrigger;
use crate::samples::{BlockOutcome, EngineState, SamplerProcessor, TriggerEvent};

/// Renders timed events through a processor into planar buffers.
#[derive(Debug, Clone, Copy)]
pub struct OfflineRenderer {
    block_size: usize,
    channels: usize,
}

impl OfflineRenderer {
    /// Creates a renderer. Zero sizes are raised to one.
    pub fn new(block_size: usize, channels: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            channels: channels.max(1),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Renders until every event has been applied and the processor has gone idle.
    /// Events take effect at the start of the block containing their frame, so timing is
    /// quantized to the block size. `events` must be sorted by frame.
    pub fn render(
        &self,
        processor: &mut SamplerProcessor,
        events: &[TimedTrigger],
    ) -> Vec<Vec<f32>> {
        let mut output: Vec<Vec<f32>> = vec![Vec::new(); self.channels];
        let mut block = vec![vec![0.0f32; self.block_size]; self.channels];
        let mut block_events = Vec::new();
        let mut next_event = 0;
        let mut block_start: u64 = 0;

        while next_event < events.len() || processor.state() != EngineState::Idle {
            let block_end = block_start + self.block_size as u64;
            block_events.clear();
            while next_event < events.len() && events[next_event].frame < block_end {
                block_events.push(events[next_event].event);
                next_event += 1;
            }

            match processor.process(&mut block, &block_events) {
                BlockOutcome::Finished => {
                    debug!(
                        key = ?processor.cursor().active_key(),
                        frame = block_start,
                        "Recording finished"
                    );
                }
                BlockOutcome::Missing => {
                    let key = block_events.iter().rev().find_map(|e| match e {
                        TriggerEvent::NoteOn { key } => Some(*key),
                        TriggerEvent::NoteOff { .. } => None,
                    });
                    warn!(?key, frame = block_start, "No recording for triggered key");
                }
                BlockOutcome::Silent | BlockOutcome::Sounding => {}
            }

            for (out, rendered) in output.iter_mut().zip(block.iter()) {
                out.extend_from_slice(rendered);
            }
            block_start = block_end;
        }

        info!(
            frames = block_start,
            blocks = block_start / self.block_size as u64,
            events = events.len(),
            "Offline render complete"
        );
        output
    }
}

/// Writes planar buffers to a 32-bit float WAV file, interleaving the channels.
pub fn write_wav(path: &Path, channels: &[Vec<f32>], sample_rate: u32) -> hound::Result<()> {
    if channels.is_empty() || channels.len() > u16::MAX as usize {
        return Err(hound::Error::Unsupported);
    }

    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels: channels.len() as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()
}
