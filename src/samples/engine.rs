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

//! Monophonic playback state machine and block renderer.
//!
//! Everything in this module runs on the audio thread: no allocation, no locking,
//! no logging.

use super::library::{Key, SampleLibrary};
use super::ramp::VolumeRamp;

/// Where playback currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    /// The key being played. `None` before the first trigger or after a trigger whose
    /// key had no recording.
    active_key: Option<Key>,
    /// Next frame of the active recording to render.
    playhead_frame: usize,
    playing: bool,
    /// Set once the recording has played to its end.
    stopping: bool,
}

impl PlaybackCursor {
    /// Returns the active key.
    pub fn active_key(&self) -> Option<Key> {
        self.active_key
    }

    /// Returns the playhead position in frames.
    pub fn playhead_frame(&self) -> usize {
        self.playhead_frame
    }

    /// Returns true while a recording is sounding.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Returns true once the active recording reached its natural end.
    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Starts `key` from its first frame, pre-empting anything already sounding.
    pub(crate) fn trigger(&mut self, key: Key) {
        self.active_key = Some(key);
        self.playhead_frame = 0;
        self.playing = true;
        self.stopping = false;
    }

    /// Stops playback and rewinds. The active key is kept so a later Note Off for it
    /// still matches.
    pub(crate) fn release(&mut self) {
        self.playing = false;
        self.stopping = false;
        self.playhead_frame = 0;
    }

    /// Marks the recording as played to its end.
    pub(crate) fn finish(&mut self) {
        self.playing = false;
        self.stopping = true;
    }

    /// Forgets the active key; used when it has no recording.
    pub(crate) fn clear_active(&mut self) {
        self.active_key = None;
        self.playing = false;
    }

    pub(crate) fn advance(&mut self, frames: usize) {
        self.playhead_frame = self.playhead_frame.saturating_add(frames);
    }
}

/// Coarse engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Sounding,
}

/// What happened while rendering a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Nothing was playing; the block is silent.
    Silent,
    /// The active recording filled the whole block and has more to play.
    Sounding,
    /// The active recording ended inside this block or on its last frame; any rest of the
    /// block is silent.
    Finished,
    /// The active key has no recording in the library; the block is silent.
    Missing,
}

/// Renders the active recording into output blocks.
#[derive(Debug, Default)]
pub struct PlaybackEngine {
    cursor: PlaybackCursor,
}

impl PlaybackEngine {
    /// Creates an idle engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the playback cursor.
    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub(crate) fn cursor_mut(&mut self) -> &mut PlaybackCursor {
        &mut self.cursor
    }

    /// Returns whether a recording is sounding.
    pub fn state(&self) -> EngineState {
        if self.cursor.playing && self.cursor.active_key.is_some() {
            EngineState::Sounding
        } else {
            EngineState::Idle
        }
    }

    /// Returns the engine to its initial idle state.
    pub fn reset(&mut self) {
        self.cursor = PlaybackCursor::default();
    }

    /// Renders one block into `output`, one slice per output channel. The block length is
    /// the shortest output channel. Every output sample is written.
    ///
    /// The ramp is advanced exactly once per frame, whether or not anything is sounding.
    pub fn render<C: AsMut<[f32]>>(
        &mut self,
        library: &SampleLibrary,
        ramp: &mut VolumeRamp,
        output: &mut [C],
    ) -> BlockOutcome {
        let num_frames = output
            .iter_mut()
            .map(|channel| channel.as_mut().len())
            .min()
            .unwrap_or(0);

        let recording = match (self.state(), self.cursor.active_key) {
            (EngineState::Sounding, Some(key)) => match library.get(key) {
                Some(recording) => recording,
                None => {
                    self.cursor.clear_active();
                    render_silence(ramp, output, num_frames);
                    return BlockOutcome::Missing;
                }
            },
            _ => {
                render_silence(ramp, output, num_frames);
                return BlockOutcome::Silent;
            }
        };

        let length = recording.frames();
        let playhead = self.cursor.playhead_frame;
        let copy_channels = recording.channel_count().min(output.len());
        let mut reached_end = false;

        for frame in 0..num_frames {
            let gain = ramp.next_value();
            let source_frame = playhead + frame;

            if source_frame < length {
                for (index, channel) in output.iter_mut().enumerate() {
                    let sample = if index < copy_channels {
                        recording
                            .channel(index)
                            .map_or(0.0, |data| data[source_frame] * gain)
                    } else {
                        0.0
                    };
                    channel.as_mut()[frame] = sample;
                }
            } else {
                reached_end = true;
                for channel in output.iter_mut() {
                    channel.as_mut()[frame] = 0.0;
                }
            }
        }

        // Frames past the block length in longer channels still must not carry garbage.
        clear_tail(output, num_frames);

        self.cursor.advance(num_frames);
        // The playhead stays below the length while playing.
        if reached_end || self.cursor.playhead_frame >= length {
            self.cursor.finish();
            BlockOutcome::Finished
        } else {
            BlockOutcome::Sounding
        }
    }
}

fn render_silence<C: AsMut<[f32]>>(ramp: &mut VolumeRamp, output: &mut [C], num_frames: usize) {
    for channel in output.iter_mut() {
        channel.as_mut().fill(0.0);
    }
    for _ in 0..num_frames {
        ramp.next_value();
    }
}

fn clear_tail<C: AsMut<[f32]>>(output: &mut [C], num_frames: usize) {
    for channel in output.iter_mut() {
        let channel = channel.as_mut();
        if channel.len() > num_frames {
            channel[num_frames..].fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::samples::dispatch::{TriggerDispatcher, TriggerEvent};
    use crate::testutil::audio_test_utils::is_silent;
    use crate::testutil::{constant_recording, ramp_recording};

    fn block(channels: usize, frames: usize) -> Vec<Vec<f32>> {
        vec![vec![f32::NAN; frames]; channels]
    }

    fn trigger(engine: &mut PlaybackEngine, key: Key) {
        TriggerDispatcher::default()
            .dispatch(&[TriggerEvent::NoteOn { key }], engine.cursor_mut());
    }

    #[test]
    fn test_idle_renders_silence() {
        let library = SampleLibrary::new();
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(1.0);
        let mut output = block(2, 64);

        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(
            engine.render(&library, &mut ramp, &mut output),
            BlockOutcome::Silent
        );
        assert!(output.iter().all(|c| is_silent(c)));
    }

    #[test]
    fn test_three_block_scenario() {
        // 2 channels, 100 frames of 1.0, block size 40.
        let mut library = SampleLibrary::new();
        library.insert(60, constant_recording("60.wav", 2, 100, 1.0));
        let mut engine = PlaybackEngine::new();
        let gain = 0.5;
        let mut ramp = VolumeRamp::new(gain);

        trigger(&mut engine, 60);

        let mut output = block(2, 40);
        assert_eq!(
            engine.render(&library, &mut ramp, &mut output),
            BlockOutcome::Sounding
        );
        assert!(output.iter().all(|c| c.iter().all(|&s| s == gain)));
        assert_eq!(engine.cursor().playhead_frame(), 40);

        let mut output = block(2, 40);
        assert_eq!(
            engine.render(&library, &mut ramp, &mut output),
            BlockOutcome::Sounding
        );
        assert!(output.iter().all(|c| c.iter().all(|&s| s == gain)));
        assert_eq!(engine.cursor().playhead_frame(), 80);
        assert!(!engine.cursor().is_stopping());

        let mut output = block(2, 40);
        assert_eq!(
            engine.render(&library, &mut ramp, &mut output),
            BlockOutcome::Finished
        );
        for channel in &output {
            assert!(channel[..20].iter().all(|&s| s == gain));
            assert!(is_silent(&channel[20..]));
        }
        assert!(engine.cursor().is_stopping());
        assert!(!engine.cursor().is_playing());
        assert_eq!(engine.state(), EngineState::Idle);

        // Subsequent blocks are silent.
        let mut output = block(2, 40);
        assert_eq!(
            engine.render(&library, &mut ramp, &mut output),
            BlockOutcome::Silent
        );
        assert!(output.iter().all(|c| is_silent(c)));
    }

    #[test]
    fn test_reads_every_frame_once_and_never_past_end() {
        // Length 100 with block 30: blocks cover 0..30, 30..60, 60..90, 90..120.
        let mut library = SampleLibrary::new();
        library.insert(1, ramp_recording("1.wav", 1, 100));
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(1.0);
        trigger(&mut engine, 1);

        let mut rendered = Vec::new();
        let mut finished_blocks = Vec::new();
        for index in 0..4 {
            let mut output = block(1, 30);
            let outcome = engine.render(&library, &mut ramp, &mut output);
            if outcome == BlockOutcome::Finished {
                finished_blocks.push(index);
            }
            rendered.extend_from_slice(&output[0]);
        }

        // Finished exactly once, in the block containing frame 100.
        assert_eq!(finished_blocks, vec![3]);
        let expected: Vec<f32> = (1..=100).map(|i| i as f32).collect();
        assert_eq!(&rendered[..100], &expected[..]);
        assert!(is_silent(&rendered[100..]));
    }

    #[test]
    fn test_recording_ending_on_block_edge_finishes_in_that_block() {
        let mut library = SampleLibrary::new();
        library.insert(60, constant_recording("60.wav", 1, 80, 1.0));
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(1.0);
        trigger(&mut engine, 60);

        let mut output = block(1, 40);
        assert_eq!(
            engine.render(&library, &mut ramp, &mut output),
            BlockOutcome::Sounding
        );

        let mut output = block(1, 40);
        assert_eq!(
            engine.render(&library, &mut ramp, &mut output),
            BlockOutcome::Finished
        );
        assert!(output[0].iter().all(|&s| s == 1.0));
        assert!(!engine.cursor().is_playing());
        assert!(engine.cursor().is_stopping());
        assert_eq!(engine.state(), EngineState::Idle);

        let mut output = block(1, 40);
        assert_eq!(
            engine.render(&library, &mut ramp, &mut output),
            BlockOutcome::Silent
        );
    }

    #[test]
    fn test_missing_key_renders_silence() {
        let mut library = SampleLibrary::new();
        library.insert(60, constant_recording("60.wav", 2, 100, 1.0));
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(1.0);

        trigger(&mut engine, 99);
        let mut output = block(2, 32);
        assert_eq!(
            engine.render(&library, &mut ramp, &mut output),
            BlockOutcome::Missing
        );
        assert!(output.iter().all(|c| is_silent(c)));
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.cursor().active_key(), None);
    }

    #[test]
    fn test_mono_into_quad_fans_out_to_first_channel_only() {
        let mut library = SampleLibrary::new();
        library.insert(60, constant_recording("60.wav", 1, 50, 0.8));
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(1.0);
        trigger(&mut engine, 60);

        let mut output = block(4, 64);
        engine.render(&library, &mut ramp, &mut output);

        assert!(output[0][..50].iter().all(|&s| s == 0.8));
        assert!(is_silent(&output[0][50..]));
        for channel in &output[1..] {
            assert!(is_silent(channel));
        }
    }

    #[test]
    fn test_quad_into_stereo_copies_first_two_channels() {
        let mut library = SampleLibrary::new();
        library.insert(60, ramp_recording("60.wav", 4, 16));
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(1.0);
        trigger(&mut engine, 60);

        let mut output = block(2, 8);
        engine.render(&library, &mut ramp, &mut output);

        assert_eq!(output[0], (1..=8).map(|i| i as f32).collect::<Vec<_>>());
        assert_eq!(
            output[1],
            (1..=8).map(|i| 1000.0 + i as f32).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_note_on_mid_playback_restarts_from_zero() {
        let mut library = SampleLibrary::new();
        library.insert(60, ramp_recording("60.wav", 1, 100));
        library.insert(62, constant_recording("62.wav", 1, 100, -1.0));
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(1.0);

        trigger(&mut engine, 60);
        let mut output = block(1, 10);
        engine.render(&library, &mut ramp, &mut output);
        assert_eq!(output[0][9], 10.0);

        trigger(&mut engine, 62);
        let mut output = block(1, 10);
        engine.render(&library, &mut ramp, &mut output);
        assert!(output[0].iter().all(|&s| s == -1.0));

        trigger(&mut engine, 60);
        let mut output = block(1, 10);
        engine.render(&library, &mut ramp, &mut output);
        assert_eq!(output[0][0], 1.0);
    }

    #[test]
    fn test_gain_ramp_advances_once_per_frame() {
        let mut library = SampleLibrary::new();
        library.insert(60, constant_recording("60.wav", 2, 1000, 1.0));
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(0.0);
        // 10 steps at 1kHz.
        ramp.set_target(1.0, Duration::from_millis(10), 1000);
        trigger(&mut engine, 60);

        let mut output = block(2, 16);
        engine.render(&library, &mut ramp, &mut output);

        // Both channels see the same gain on a given frame.
        assert_eq!(output[0], output[1]);
        assert!((output[0][0] - 0.1).abs() < 1e-6);
        assert_eq!(output[0][9], 1.0);
        assert!(output[0][10..].iter().all(|&s| s == 1.0));
        assert!(!ramp.is_ramping());
    }

    #[test]
    fn test_gain_ramp_keeps_moving_in_silence() {
        let library = SampleLibrary::new();
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(0.0);
        ramp.set_target(1.0, Duration::from_millis(10), 1000);

        let mut output = block(2, 10);
        engine.render(&library, &mut ramp, &mut output);
        assert_eq!(ramp.current(), 1.0);
        assert!(!ramp.is_ramping());
    }

    #[test]
    fn test_uneven_output_channels_are_fully_written() {
        let mut library = SampleLibrary::new();
        library.insert(60, constant_recording("60.wav", 2, 100, 1.0));
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(1.0);
        trigger(&mut engine, 60);

        let mut output = vec![vec![f32::NAN; 8], vec![f32::NAN; 12]];
        engine.render(&library, &mut ramp, &mut output);

        assert!(output[0].iter().all(|&s| s == 1.0));
        assert!(output[1][..8].iter().all(|&s| s == 1.0));
        assert!(is_silent(&output[1][8..]));
        assert_eq!(engine.cursor().playhead_frame(), 8);
    }

    #[test]
    fn test_render_into_borrowed_slices() {
        let mut library = SampleLibrary::new();
        library.insert(60, constant_recording("60.wav", 1, 4, 1.0));
        let mut engine = PlaybackEngine::new();
        let mut ramp = VolumeRamp::new(1.0);
        trigger(&mut engine, 60);

        let mut left = [f32::NAN; 4];
        let mut right = [f32::NAN; 4];
        {
            let mut output: [&mut [f32]; 2] = [&mut left, &mut right];
            engine.render(&library, &mut ramp, &mut output);
        }
        assert_eq!(left, [1.0; 4]);
        assert_eq!(right, [0.0; 4]);
    }

    #[test]
    fn test_reset() {
        let mut engine = PlaybackEngine::new();
        trigger(&mut engine, 60);
        assert_eq!(engine.state(), EngineState::Sounding);
        engine.reset();
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.cursor(), &PlaybackCursor::default());
    }
}
