//! Hardware port enumeration and connection

use midir::{MidiOutput, MidiOutputConnection};
use tracing::debug;

use super::TransportError;

/// An open output port
pub trait PortConnection: Send {
    /// Write one raw MIDI event; the error is the backend's diagnostic text
    fn send(&mut self, data: &[u8]) -> Result<(), String>;
}

/// Enumerates and opens hardware output ports
pub trait PortBackend: Send + Sync {
    fn output_ports(&self) -> Result<Vec<String>, TransportError>;

    fn connect(&self, port_name: &str) -> Result<Box<dyn PortConnection>, TransportError>;
}

/// Pick the port a channel name refers to.
///
/// An exact case-insensitive match wins; otherwise the first port whose name
/// starts with `pattern` (case-insensitive).
pub fn match_port<'a>(ports: &'a [String], pattern: &str) -> Option<&'a str> {
    let wanted = pattern.to_lowercase();
    ports
        .iter()
        .find(|p| p.to_lowercase() == wanted)
        .or_else(|| ports.iter().find(|p| p.to_lowercase().starts_with(&wanted)))
        .map(String::as_str)
}

/// [`PortBackend`] over the system MIDI stack
#[derive(Debug, Clone)]
pub struct MidirBackend {
    client_name: String,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn output(&self) -> Result<MidiOutput, TransportError> {
        MidiOutput::new(&self.client_name).map_err(|e| TransportError::Backend(e.to_string()))
    }
}

impl PortBackend for MidirBackend {
    fn output_ports(&self) -> Result<Vec<String>, TransportError> {
        let midi_out = self.output()?;
        let mut port_names = Vec::new();
        for port in midi_out.ports() {
            if let Ok(name) = midi_out.port_name(&port) {
                port_names.push(name);
            }
        }
        debug!("Found {} MIDI output ports", port_names.len());
        Ok(port_names)
    }

    fn connect(&self, port_name: &str) -> Result<Box<dyn PortConnection>, TransportError> {
        let midi_out = self.output()?;
        let port = midi_out
            .ports()
            .into_iter()
            .find(|p| midi_out.port_name(p).map(|n| n == port_name).unwrap_or(false))
            .ok_or_else(|| TransportError::ChannelNotFound(port_name.to_string()))?;

        let conn = midi_out
            .connect(&port, &self.client_name)
            .map_err(|e| TransportError::OpenFailed {
                channel: port_name.to_string(),
                diagnostic: e.to_string(),
            })?;
        Ok(Box::new(MidirConnection(conn)))
    }
}

struct MidirConnection(MidiOutputConnection);

impl PortConnection for MidirConnection {
    fn send(&mut self, data: &[u8]) -> Result<(), String> {
        self.0.send(data).map_err(|e| e.to_string())
    }
}
