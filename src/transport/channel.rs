//! A single device output channel with bounded-retry sends

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::backend::{match_port, PortBackend, PortConnection};
use super::TransportError;
use crate::context::RequestContext;
use crate::midi::{format_hex, ControlChangeMessage};

/// Bounded retry policy for a single send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, including the first one
    pub max_retries: u32,
    /// Fixed wait between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(50),
        }
    }
}

pub struct OutputChannel {
    name: String,
    midi_channel: u8,
    backend: Arc<dyn PortBackend>,
    connection: Option<Box<dyn PortConnection>>,
    resolved_port: Option<String>,
}

impl fmt::Debug for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputChannel")
            .field("name", &self.name)
            .field("midi_channel", &self.midi_channel)
            .field("resolved_port", &self.resolved_port)
            .field("open", &self.is_open())
            .finish()
    }
}

impl OutputChannel {
    pub fn new(name: impl Into<String>, midi_channel: u8, backend: Arc<dyn PortBackend>) -> Self {
        Self {
            name: name.into(),
            midi_channel,
            backend,
            connection: None,
            resolved_port: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Port the channel name matched on the last successful open
    pub fn resolved_port(&self) -> Option<&str> {
        self.resolved_port.as_deref()
    }

    /// Bind to the first hardware port matching the channel name.
    ///
    /// No-op when already open.
    pub fn open(&mut self) -> Result<(), TransportError> {
        if self.connection.is_some() {
            return Ok(());
        }

        let ports = self.backend.output_ports()?;
        let port = match_port(&ports, &self.name)
            .ok_or_else(|| TransportError::ChannelNotFound(self.name.clone()))?
            .to_string();

        let conn = self.backend.connect(&port)?;
        debug!(channel = %self.name, port = %port, "Output channel opened");
        self.connection = Some(conn);
        self.resolved_port = Some(port);
        Ok(())
    }

    /// Idempotent
    pub fn close(&mut self) {
        if self.connection.take().is_some() {
            debug!(channel = %self.name, "Output channel closed");
        }
    }

    /// Send one Control-Change event, retrying per `policy`.
    ///
    /// Out-of-range messages and unknown channels fail before any retry. Between
    /// failed attempts the connection is reopened and the delay is raced against
    /// the request's cancellation signal. With `close_after_send` the channel is
    /// closed once the event went out or the request was cancelled.
    pub async fn send(
        &mut self,
        ctx: &RequestContext,
        message: ControlChangeMessage,
        policy: &RetryPolicy,
        close_after_send: bool,
    ) -> Result<(), TransportError> {
        let frame = message
            .encode(self.midi_channel)
            .ok_or_else(|| TransportError::OutOfRange {
                channel: self.name.clone(),
                message,
            })?;

        if ctx.is_cancelled() {
            return Err(self.cancelled(close_after_send));
        }
        self.open()?;

        let attempts = policy.max_retries.max(1);
        let mut diagnostic = String::new();

        for attempt in 1..=attempts {
            if ctx.is_cancelled() {
                return Err(self.cancelled(close_after_send));
            }

            // A failed reopen leaves no connection; its error stays the diagnostic
            let written = match self.connection.as_mut() {
                Some(conn) => conn.send(&frame),
                None => Err(std::mem::take(&mut diagnostic)),
            };

            match written {
                Ok(()) => {
                    debug!(channel = %self.name, attempt, "Sent: {} | {}", format_hex(&frame), message);
                    if close_after_send {
                        self.close();
                    }
                    return Ok(());
                }
                Err(e) => {
                    warn!(channel = %self.name, attempt, "Send failed: {}", e);
                    diagnostic = e;
                }
            }

            if attempt == attempts {
                break;
            }

            self.close();
            if let Err(e) = self.open() {
                diagnostic = e.to_string();
            }

            tokio::select! {
                _ = ctx.cancellation().cancelled() => {
                    info!(channel = %self.name, "Retry wait cancelled");
                    return Err(self.cancelled(close_after_send));
                }
                _ = tokio::time::sleep(policy.delay) => {}
            }
        }

        self.close();
        Err(TransportError::SendFailed {
            channel: self.name.clone(),
            attempts,
            diagnostic,
        })
    }

    fn cancelled(&mut self, close_after_send: bool) -> TransportError {
        if close_after_send {
            self.close();
        }
        TransportError::Cancelled(self.name.clone())
    }
}

impl Drop for OutputChannel {
    fn drop(&mut self) {
        self.close();
    }
}
