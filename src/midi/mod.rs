//! MIDI message model
//!
//! Incoming raw bytes are parsed into a closed set of event kinds. Only
//! Control Change is routed today; everything else parses so it can be
//! logged and ignored.

pub mod input;

use std::fmt;

pub use input::{list_input_ports, list_output_ports, MidiError, MidiInputDevice};

/// Control Change: channel (0-15), controller (0-127), value (0-127)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChangeEvent {
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

/// Incoming MIDI event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEvent {
    ControlChange(ControlChangeEvent),

    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Note Off (or Note On with velocity 0)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    ProgramChange { channel: u8, program: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit)
    PitchBend { channel: u8, value: u16 },

    /// Anything else (aftertouch, SysEx, realtime, ...), raw status byte kept
    Other { status: u8 },
}

impl MidiEvent {
    /// Parse a single MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status is not produced by midir
        if status < 0x80 {
            return None;
        }

        if status >= 0xF0 {
            return Some(MidiEvent::Other { status });
        }

        let channel = status & 0x0F;
        let byte = |i: usize| rest.get(i).map(|b| b & 0x7F);

        let event = match status & 0xF0 {
            0x80 => MidiEvent::NoteOff {
                channel,
                note: byte(0)?,
                velocity: byte(1)?,
            },
            0x90 => {
                let note = byte(0)?;
                let velocity = byte(1)?;
                if velocity == 0 {
                    MidiEvent::NoteOff { channel, note, velocity }
                } else {
                    MidiEvent::NoteOn { channel, note, velocity }
                }
            }
            0xB0 => MidiEvent::ControlChange(ControlChangeEvent {
                channel,
                controller: byte(0)?,
                value: byte(1)?,
            }),
            0xC0 => MidiEvent::ProgramChange {
                channel,
                program: byte(0)?,
            },
            0xE0 => {
                let lsb = byte(0)? as u16;
                let msb = byte(1)? as u16;
                MidiEvent::PitchBend {
                    channel,
                    value: (msb << 7) | lsb,
                }
            }
            _ => MidiEvent::Other { status },
        };

        Some(event)
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiEvent::ControlChange(cc) => write!(
                f,
                "CC ch:{} cc:{} v:{}",
                cc.channel, cc.controller, cc.value
            ),
            MidiEvent::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel, note, velocity)
            }
            MidiEvent::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel, note, velocity)
            }
            MidiEvent::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel, program)
            }
            MidiEvent::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel, value)
            }
            MidiEvent::Other { status } => write!(f, "Other status:{:02X}", status),
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
