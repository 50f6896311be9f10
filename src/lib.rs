//! MidiFX GW - drive outboard MIDI effects hardware from a persisted device model
//!
//! The gateway turns logical requests ("activate ReverbEngineB", "set Mix to 90",
//! "reset the pedal") into raw Control-Change messages and keeps the persisted
//! device documents consistent with hardware that cannot be read back.

pub mod activation;
pub mod config;
pub mod context;
pub mod error;
pub mod midi;
pub mod model;
pub mod paths;
pub mod reconcile;
pub mod resolver;
pub mod service;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use activation::{Activator, ActivatorRegistry, DualEngineActivator, ToggleActivator};
pub use config::AppConfig;
pub use context::RequestContext;
pub use error::{ControlError, ErrorCategory, NotFound};
pub use midi::ControlChangeMessage;
pub use model::{
    AddressBinding, Device, DeviceSettingBinding, Effect, EffectCatalogEntry, ImplementationMapping,
    Selection, Selector, Setting,
};
pub use service::{ActivationOutcome, MidiFxController, ResetOutcome, ResetReport, SetSettingRequest};
pub use store::{DocumentStore, FileStore, MemoryStore, Repository, StoreError, StoreRequest};
pub use transport::{ChannelRegistry, MidirBackend, OutputChannel, PortBackend, RetryPolicy, TransportError};
