//! Per-device channel registry
//!
//! Every `ConnectName` maps to exactly one [`OutputChannel`] behind an async
//! mutex, so the open/send/close sequence of one request never interleaves
//! with another request for the same device.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::backend::PortBackend;
use super::channel::OutputChannel;
use super::TransportError;

pub struct ChannelRegistry {
    backend: Arc<dyn PortBackend>,
    midi_channel: u8,
    channels: DashMap<String, Arc<Mutex<OutputChannel>>>,
}

impl ChannelRegistry {
    pub fn new(backend: Arc<dyn PortBackend>, midi_channel: u8) -> Self {
        Self {
            backend,
            midi_channel,
            channels: DashMap::new(),
        }
    }

    /// Exclusive access to the channel for `connect_name`, waiting for any
    /// request already holding it
    pub async fn acquire(&self, connect_name: &str) -> OwnedMutexGuard<OutputChannel> {
        let channel = self
            .channels
            .entry(connect_name.to_lowercase())
            .or_insert_with(|| {
                debug!(channel = %connect_name, "Registering output channel");
                Arc::new(Mutex::new(OutputChannel::new(
                    connect_name,
                    self.midi_channel,
                    self.backend.clone(),
                )))
            })
            .clone();

        channel.lock_owned().await
    }

    pub fn list_ports(&self) -> Result<Vec<String>, TransportError> {
        self.backend.output_ports()
    }

    /// Close every channel not currently held by a request
    pub fn close_all(&self) {
        for entry in self.channels.iter() {
            if let Ok(mut channel) = entry.value().try_lock() {
                channel.close();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
