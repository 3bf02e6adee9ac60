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
use std::fs;
use std::path::Path;

use midly::{Format, MetaMessage, Smf, Timing, TrackEventKind};
use tracing::debug;

use crate::samples::TriggerEvent;

/// Tempo assumed until the first tempo event: 120 BPM.
const DEFAULT_TEMPO_MICROS_PER_BEAT: u32 = 500_000;

#[derive(Debug, thiserror::Error)]
pub enum MidiFileError {
    #[error("MIDI parse error: {0}")]
    Parse(#[from] midly::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A trigger event stamped with the output frame it happens at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedTrigger {
    pub frame: u64,
    pub event: TriggerEvent,
}

/// Reads a Standard MIDI File and returns its note events in time order.
pub fn read_trigger_events(
    path: &Path,
    sample_rate: u32,
) -> Result<Vec<TimedTrigger>, MidiFileError> {
    let buf = fs::read(path)?;
    parse_trigger_events(&buf, sample_rate)
}

/// Parses a Standard MIDI File and returns its note events in time order. Simultaneous
/// events keep track order, then file order.
pub fn parse_trigger_events(
    bytes: &[u8],
    sample_rate: u32,
) -> Result<Vec<TimedTrigger>, MidiFileError> {
    let smf = Smf::parse(bytes)?;

    // Flatten all tracks onto one absolute tick timeline.
    let mut timeline = Vec::new();
    let mut track_offset: u64 = 0;
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick = track_offset;
        for (event_index, event) in track.iter().enumerate() {
            tick += event.delta.as_int() as u64;
            timeline.push((tick, track_index, event_index, event.kind));
        }
        // Sequential files play their tracks back to back.
        if smf.header.format == Format::Sequential {
            track_offset = tick;
        }
    }
    timeline.sort_by_key(|(tick, track, index, _)| (*tick, *track, *index));

    let mut clock = TickClock::new(smf.header.timing);
    let mut triggers = Vec::new();
    for (tick, _, _, kind) in timeline {
        let seconds = clock.seconds_at(tick);
        match kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => clock.set_tempo(tempo.as_int()),
            TrackEventKind::Midi { message, .. } => {
                if let Some(event) = TriggerEvent::from_message(&message) {
                    triggers.push(TimedTrigger {
                        frame: (seconds * sample_rate as f64).round() as u64,
                        event,
                    });
                }
            }
            _ => {}
        }
    }

    debug!(
        tracks = smf.tracks.len(),
        events = triggers.len(),
        "Parsed MIDI file"
    );
    Ok(triggers)
}

/// Converts absolute ticks to seconds, following tempo changes.
struct TickClock {
    timing: Timing,
    tempo_micros_per_beat: u32,
    last_tick: u64,
    last_seconds: f64,
}

impl TickClock {
    fn new(timing: Timing) -> Self {
        Self {
            timing,
            tempo_micros_per_beat: DEFAULT_TEMPO_MICROS_PER_BEAT,
            last_tick: 0,
            last_seconds: 0.0,
        }
    }

    /// Ticks must be non-decreasing between calls.
    fn seconds_at(&mut self, tick: u64) -> f64 {
        let delta = tick.saturating_sub(self.last_tick) as f64;
        let seconds_per_tick = match self.timing {
            Timing::Metrical(ticks_per_beat) => {
                let ticks_per_beat = ticks_per_beat.as_int().max(1) as f64;
                self.tempo_micros_per_beat as f64 / 1_000_000.0 / ticks_per_beat
            }
            Timing::Timecode(fps, subframe) => {
                1.0 / (fps.as_f32() as f64 * subframe.max(1) as f64)
            }
        };
        self.last_seconds += delta * seconds_per_tick;
        self.last_tick = tick;
        self.last_seconds
    }

    fn set_tempo(&mut self, tempo_micros_per_beat: u32) {
        self.tempo_micros_per_beat = tempo_micros_per_beat;
    }
}

#[cfg(test)]
mod tests {
    use midly::{Fps, Header, MidiMessage, TrackEvent};

    use super::*;

    fn note_on(delta: u32, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn {
                    key: key.into(),
                    vel: 100.into(),
                },
            },
        }
    }

    fn note_off(delta: u32, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOff {
                    key: key.into(),
                    vel: 0.into(),
                },
            },
        }
    }

    fn tempo(delta: u32, micros_per_beat: u32) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(micros_per_beat.into())),
        }
    }

    fn end_of_track() -> TrackEvent<'static> {
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        }
    }

    fn encode(format: Format, timing: Timing, tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(format, timing));
        smf.tracks = tracks;
        let mut buf = Vec::new();
        smf.write_std(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_default_tempo() {
        let bytes = encode(
            Format::SingleTrack,
            Timing::Metrical(480.into()),
            vec![vec![note_on(0, 60), note_off(480, 60), end_of_track()]],
        );

        let events = parse_trigger_events(&bytes, 44100).unwrap();
        assert_eq!(
            events,
            vec![
                TimedTrigger {
                    frame: 0,
                    event: TriggerEvent::NoteOn { key: 60 },
                },
                TimedTrigger {
                    frame: 22050,
                    event: TriggerEvent::NoteOff { key: 60 },
                },
            ]
        );
    }

    #[test]
    fn test_tempo_change() {
        let bytes = encode(
            Format::SingleTrack,
            Timing::Metrical(480.into()),
            vec![vec![
                note_on(0, 60),
                // 60 BPM from beat 1 onwards.
                tempo(480, 1_000_000),
                note_on(480, 62),
                end_of_track(),
            ]],
        );

        let events = parse_trigger_events(&bytes, 44100).unwrap();
        let frames: Vec<u64> = events.iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![0, 66150]);
    }

    #[test]
    fn test_parallel_tracks_are_merged() {
        let bytes = encode(
            Format::Parallel,
            Timing::Metrical(96.into()),
            vec![
                vec![tempo(0, 500_000), note_on(96, 64), end_of_track()],
                vec![note_on(48, 60), note_on(96, 62), end_of_track()],
            ],
        );

        let events = parse_trigger_events(&bytes, 1000).unwrap();
        let keys: Vec<u32> = events.iter().map(|e| e.event.key()).collect();
        let frames: Vec<u64> = events.iter().map(|e| e.frame).collect();
        // Track 0's key 64 and track 1's key 62 are not simultaneous; 60 comes first.
        assert_eq!(keys, vec![60, 64, 62]);
        assert_eq!(frames, vec![250, 500, 750]);
    }

    #[test]
    fn test_simultaneous_events_keep_track_order() {
        let bytes = encode(
            Format::Parallel,
            Timing::Metrical(96.into()),
            vec![
                vec![note_on(96, 64), end_of_track()],
                vec![note_on(96, 60), end_of_track()],
            ],
        );

        let events = parse_trigger_events(&bytes, 1000).unwrap();
        let keys: Vec<u32> = events.iter().map(|e| e.event.key()).collect();
        assert_eq!(keys, vec![64, 60]);
    }

    #[test]
    fn test_timecode_timing() {
        // 25 fps * 40 subframes = 1000 ticks per second.
        let bytes = encode(
            Format::SingleTrack,
            Timing::Timecode(Fps::Fps25, 40),
            vec![vec![note_on(500, 60), end_of_track()]],
        );

        let events = parse_trigger_events(&bytes, 48000).unwrap();
        assert_eq!(events[0].frame, 24000);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(matches!(
            parse_trigger_events(b"not a midi file", 44100),
            Err(MidiFileError::Parse(_))
        ));
    }
}
