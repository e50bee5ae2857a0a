//! MIDI wire messages
//!
//! The Launchpad speaks exactly three message shapes, all on channel 1:
//! note-on, note-off and control-change. Parsing drops everything else.

use std::fmt;

/// MIDI message shapes exchanged with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: note (0-127), velocity (0-127)
    NoteOff { note: u8, velocity: u8 },

    /// Note On: note (0-127), velocity (0-127)
    NoteOn { note: u8, velocity: u8 },

    /// Control Change: control (0-127), value (0-127)
    ControlChange { control: u8, value: u8 },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes.
    ///
    /// Only the three shapes the device emits are recognized; the channel
    /// nibble is ignored. Note On with velocity 0 parses as Note Off.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 3 {
            return None;
        }

        match data[0] & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff {
                note: data[1] & 0x7F,
                velocity: data[2] & 0x7F,
            }),
            0x90 => {
                let note = data[1] & 0x7F;
                let velocity = data[2] & 0x7F;

                if velocity == 0 {
                    Some(MidiMessage::NoteOff { note, velocity: 0 })
                } else {
                    Some(MidiMessage::NoteOn { note, velocity })
                }
            }
            0xB0 => Some(MidiMessage::ControlChange {
                control: data[1] & 0x7F,
                value: data[2] & 0x7F,
            }),
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes (channel 1)
    pub fn encode(&self) -> [u8; 3] {
        match *self {
            MidiMessage::NoteOff { note, velocity } => [0x80, note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOn { note, velocity } => [0x90, note & 0x7F, velocity & 0x7F],
            MidiMessage::ControlChange { control, value } => [0xB0, control & 0x7F, value & 0x7F],
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { note, velocity } => {
                write!(f, "NoteOff n:{} v:{}", note, velocity)
            }
            MidiMessage::NoteOn { note, velocity } => {
                write!(f, "NoteOn n:{} v:{}", note, velocity)
            }
            MidiMessage::ControlChange { control, value } => {
                write!(f, "CC cc:{} v:{}", control, value)
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
