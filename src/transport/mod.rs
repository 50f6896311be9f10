//! Device output channels
//!
//! One [`OutputChannel`] per physical `ConnectName`, handed out by the
//! [`ChannelRegistry`] under a per-device lock. Hardware access goes through the
//! [`PortBackend`] seam so the retry and matching logic can be driven by tests.

mod backend;
mod channel;
mod registry;

pub use backend::{match_port, MidirBackend, PortBackend, PortConnection};
pub use channel::{OutputChannel, RetryPolicy};
pub use registry::ChannelRegistry;

use thiserror::Error;

use crate::midi::ControlChangeMessage;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("no output channel matches '{0}'")]
    ChannelNotFound(String),

    #[error("failed to open output channel '{channel}': {diagnostic}")]
    OpenFailed { channel: String, diagnostic: String },

    #[error("send to '{channel}' failed after {attempts} attempt(s): {diagnostic}")]
    SendFailed {
        channel: String,
        attempts: u32,
        diagnostic: String,
    },

    #[error("{message} on '{channel}' is outside the MIDI data range 0-127")]
    OutOfRange {
        channel: String,
        message: ControlChangeMessage,
    },

    #[error("send to '{0}' cancelled")]
    Cancelled(String),

    #[error("MIDI backend error: {0}")]
    Backend(String),
}
