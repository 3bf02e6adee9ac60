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

//! Note-on/note-off handling for the monophonic engine.

use midly::live::LiveEvent;
use midly::MidiMessage;
use serde::{Deserialize, Serialize};

use super::engine::PlaybackCursor;
use super::library::Key;

/// A trigger event delivered to the sampler for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    NoteOn { key: Key },
    NoteOff { key: Key },
}

impl TriggerEvent {
    /// Returns the key the event refers to.
    pub fn key(&self) -> Key {
        match self {
            TriggerEvent::NoteOn { key } | TriggerEvent::NoteOff { key } => *key,
        }
    }

    /// Parses a raw live MIDI message. Note On with velocity 0 is treated as Note Off.
    /// The MIDI channel is ignored; anything other than a note message yields `None`.
    pub fn from_midi(raw_event: &[u8]) -> Option<TriggerEvent> {
        match LiveEvent::parse(raw_event).ok()? {
            LiveEvent::Midi { message, .. } => Self::from_message(&message),
            _ => None,
        }
    }

    /// Converts a channel message to a trigger event.
    pub fn from_message(message: &MidiMessage) -> Option<TriggerEvent> {
        match message {
            MidiMessage::NoteOn { key, vel } if u8::from(*vel) == 0 => Some(TriggerEvent::NoteOff {
                key: u8::from(*key) as Key,
            }),
            MidiMessage::NoteOn { key, .. } => Some(TriggerEvent::NoteOn {
                key: u8::from(*key) as Key,
            }),
            MidiMessage::NoteOff { key, .. } => Some(TriggerEvent::NoteOff {
                key: u8::from(*key) as Key,
            }),
            _ => None,
        }
    }
}

/// Behavior when a Note Off event is received.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteOffBehavior {
    /// Recordings always play to their end. A Note Off only acknowledges a recording
    /// that has already finished.
    #[default]
    PlayToCompletion,
    /// A Note Off for the sounding key cuts playback immediately.
    Stop,
}

/// Applies a block's events to the playback cursor before the block is rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerDispatcher {
    note_off: NoteOffBehavior,
}

impl TriggerDispatcher {
    /// Creates a dispatcher with the given Note Off behavior.
    pub fn new(note_off: NoteOffBehavior) -> Self {
        Self { note_off }
    }

    /// Returns the Note Off behavior.
    pub fn note_off(&self) -> NoteOffBehavior {
        self.note_off
    }

    /// Applies events in arrival order. Later Note Ons overwrite earlier ones, so only the
    /// last one in a block is audible.
    pub fn dispatch(&self, events: &[TriggerEvent], cursor: &mut PlaybackCursor) {
        for event in events {
            match *event {
                TriggerEvent::NoteOn { key } => cursor.trigger(key),
                TriggerEvent::NoteOff { key } => self.handle_note_off(key, cursor),
            }
        }
    }

    fn handle_note_off(&self, key: Key, cursor: &mut PlaybackCursor) {
        if cursor.active_key() != Some(key) {
            return;
        }
        match self.note_off {
            NoteOffBehavior::PlayToCompletion => {
                if cursor.is_stopping() {
                    cursor.release();
                }
            }
            NoteOffBehavior::Stop => cursor.release(),
        }
    }
}
