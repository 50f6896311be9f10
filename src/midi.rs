//! MIDI Control-Change message type and wire encoding
//!
//! The gateway only ever emits Control-Change events: a status byte carrying
//! the channel, the controller address and the value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status nibble of a Control-Change event
pub const CONTROL_CHANGE_STATUS: u8 = 0xB0;

/// Highest value a MIDI data byte can carry
pub const DATA_BYTE_MAX: i32 = 127;

/// A single Control-Change command: controller address plus value.
///
/// Both fields are plain integers because the persisted model stores them that
/// way; range checking happens at the wire boundary in [`ControlChangeMessage::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControlChangeMessage {
    pub address: i32,
    pub value: i32,
}

impl ControlChangeMessage {
    pub fn new(address: i32, value: i32) -> Self {
        Self { address, value }
    }

    /// Same address, different value (used to build compensating messages)
    pub fn with_value(self, value: i32) -> Self {
        Self { value, ..self }
    }

    /// Whether address and value both fit into a MIDI data byte
    pub fn in_range(&self) -> bool {
        is_data_byte(self.address) && is_data_byte(self.value)
    }

    /// Encode as a 3-byte Control-Change event on a 1-based MIDI channel.
    ///
    /// Returns `None` when the address or value is outside 0-127 or the
    /// channel is outside 1-16.
    pub fn encode(&self, channel: u8) -> Option<[u8; 3]> {
        if !(1..=16).contains(&channel) || !self.in_range() {
            return None;
        }
        Some([
            CONTROL_CHANGE_STATUS | (channel - 1),
            self.address as u8,
            self.value as u8,
        ])
    }

    /// Decode a raw Control-Change event, ignoring the channel nibble
    pub fn decode(data: &[u8]) -> Option<Self> {
        match data {
            [status, address, value, ..] if status & 0xF0 == CONTROL_CHANGE_STATUS => Some(Self {
                address: (*address & 0x7F) as i32,
                value: (*value & 0x7F) as i32,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for ControlChangeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CC {}={}", self.address, self.value)
    }
}

fn is_data_byte(value: i32) -> bool {
    (0..=DATA_BYTE_MAX).contains(&value)
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
