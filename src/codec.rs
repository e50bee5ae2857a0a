//! Logical pad addressing and the wire codec
//!
//! The device multiplexes three control groups onto two MIDI message
//! families with an arithmetic offset scheme:
//!
//!   - grid cell (row r, col c)  -> note 16*r + c      (8x8, notes 0..=119)
//!   - command column, button i  -> note 16*i + 8      (the "+8" slot of each stride)
//!   - command row, button i     -> control 104 + i    (CC 104..=111)
//!
//! LED data bytes carry two 2-bit intensities packed as hex digits: green
//! in the high nibble, red in the low nibble. Press and release arrive as
//! data value 127 and 0 on the same addresses.
//!
//! Keeping the whole scheme in this module is what stops the offset
//! arithmetic from leaking into every caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::midi::MidiMessage;

/// The three physical control groups on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Top strip of 8 round buttons (CC 104..=111)
    CommandRow,
    /// Right-hand strip of 8 round buttons (notes 8, 24, .., 120)
    CommandColumn,
    /// The main 8x8 pad grid
    Grid,
}

impl Region {
    /// Number of addressable pads in this region
    pub const fn pad_count(self) -> u8 {
        match self {
            Region::CommandRow | Region::CommandColumn => 8,
            Region::Grid => 64,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::CommandRow => "row",
            Region::CommandColumn => "column",
            Region::Grid => "grid",
        };
        f.write_str(name)
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "row" => Ok(Region::CommandRow),
            "column" => Ok(Region::CommandColumn),
            "grid" => Ok(Region::Grid),
            other => Err(Error::InvalidRegion(other.to_string())),
        }
    }
}

/// LED intensity per color channel, two bits on the wire
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Brightness {
    #[default]
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Brightness {
    /// Numeric level as encoded in the data nibble
    pub const fn level(self) -> u8 {
        self as u8
    }
}

/// One physical control, identified by region and linear index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PadAddress {
    pub region: Region,
    pub index: u8,
}

impl PadAddress {
    /// Build an address, validating the index against the region's range
    pub fn new(region: Region, index: u8) -> Result<Self, Error> {
        let max = region.pad_count();
        if index >= max {
            return Err(Error::IndexOutOfRange { region, index, max });
        }
        Ok(Self { region, index })
    }

    /// Grid address from (row, col) coordinates, both in 0..8
    pub fn grid_cell(row: u8, col: u8) -> Result<Self, Error> {
        if row >= 8 {
            return Err(Error::IndexOutOfRange {
                region: Region::Grid,
                index: row,
                max: 8,
            });
        }
        if col >= 8 {
            return Err(Error::IndexOutOfRange {
                region: Region::Grid,
                index: col,
                max: 8,
            });
        }
        Self::new(Region::Grid, row * 8 + col)
    }
}

impl fmt::Display for PadAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.region, self.index)
    }
}

/// Button edge decoded from a wire data value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadEdge {
    Press,
    Release,
}

/// Pack two brightness levels into one data byte: green high, red low
const fn data_byte(green: Brightness, red: Brightness) -> u8 {
    (green.level() << 4) | red.level()
}

/// Encode the LED-set message for a pad.
///
/// The address is already validated, so every arm is total:
/// grid 0 -> note 0, grid 9 -> note 17, grid 63 -> note 119,
/// column 3 -> note 56, row 7 -> CC 111.
pub fn led_message(addr: PadAddress, green: Brightness, red: Brightness) -> MidiMessage {
    let data = data_byte(green, red);
    match addr.region {
        Region::CommandRow => MidiMessage::ControlChange {
            control: 104 + addr.index,
            value: data,
        },
        Region::CommandColumn => MidiMessage::NoteOn {
            note: addr.index * 16 + 8,
            velocity: data,
        },
        Region::Grid => MidiMessage::NoteOn {
            note: 16 * (addr.index / 8) + (addr.index % 8),
            velocity: data,
        },
    }
}

/// Split an inbound message into its logical address and raw data value
fn split(msg: &MidiMessage) -> Option<(PadAddress, u8)> {
    match *msg {
        MidiMessage::ControlChange { control, value } => {
            if !(104..=111).contains(&control) {
                return None;
            }
            let addr = PadAddress {
                region: Region::CommandRow,
                index: control - 104,
            };
            Some((addr, value))
        }
        MidiMessage::NoteOn { note, velocity } | MidiMessage::NoteOff { note, velocity } => {
            let addr = if note >= 8 && (note - 8) % 16 == 0 {
                PadAddress {
                    region: Region::CommandColumn,
                    index: (note - 8) / 16,
                }
            } else {
                // Total over every 7-bit note number; the device only ever
                // emits the 0..=119 grid range, so collisions outside it
                // cannot occur in practice.
                PadAddress {
                    region: Region::Grid,
                    index: (note / 16) * 8 + (note % 8),
                }
            };
            Some((addr, velocity))
        }
    }
}

/// Decode the address of an inbound message, ignoring its data value
pub fn decode_address(msg: &MidiMessage) -> Option<PadAddress> {
    split(msg).map(|(addr, _)| addr)
}

/// Decode an inbound message into an address and a press/release edge.
///
/// Data values other than 127 (press) and 0 (release) are neither edge and
/// decode to `None`; buttons never emit them.
pub fn decode(msg: &MidiMessage) -> Option<(PadAddress, PadEdge)> {
    let (addr, data) = split(msg)?;
    let edge = match data {
        127 => PadEdge::Press,
        0 => PadEdge::Release,
        _ => return None,
    };
    Some((addr, edge))
}
