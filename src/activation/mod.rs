//! Effect activation strategies
//!
//! Each device family turns an effect on or off differently. The strategy is a
//! closed set ([`Activator`]) chosen per device name once at startup by the
//! [`ActivatorRegistry`]; devices without a registration fall back to a plain
//! on/off toggle.

mod dual_engine;
mod toggle;

pub use dual_engine::DualEngineActivator;
pub use toggle::ToggleActivator;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::NotFound;
use crate::midi::ControlChangeMessage;
use crate::model::Device;

/// Device name registered for the dual-engine strategy by default
pub const DUAL_REVERB_DEVICE: &str = "VentrisDualReverb";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Activator {
    DualEngine(DualEngineActivator),
    Toggle(ToggleActivator),
}

impl Activator {
    /// CC message turning `effect_name` on or off.
    ///
    /// `Ok(None)` means there is nothing to send for this effect, which callers
    /// treat as a no-op rather than an error.
    pub fn build_activation_message(
        &self,
        device: &Device,
        effect_name: &str,
        activate: bool,
    ) -> Result<Option<ControlChangeMessage>, NotFound> {
        match self {
            Activator::DualEngine(a) => Ok(a.build_activation_message(device, effect_name, activate)),
            Activator::Toggle(a) => a.build_activation_message(device, effect_name, activate),
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Activator::DualEngine(_) => "dual_engine",
            Activator::Toggle(_) => "toggle",
        }
    }
}

/// Device name (case-insensitive) to activation strategy
#[derive(Debug, Clone)]
pub struct ActivatorRegistry {
    activators: HashMap<String, Activator>,
    fallback: Activator,
}

impl ActivatorRegistry {
    /// Empty registry: every device uses `fallback`
    pub fn new(fallback: ToggleActivator) -> Self {
        Self {
            activators: HashMap::new(),
            fallback: Activator::Toggle(fallback),
        }
    }

    pub fn register(&mut self, device_name: &str, activator: Activator) {
        debug!(device = %device_name, strategy = activator.strategy(), "Registering activator");
        self.activators.insert(device_name.to_lowercase(), activator);
    }

    /// Explicitly registered strategy for a device
    pub fn get_activator(&self, device_name: &str) -> Result<&Activator, NotFound> {
        self.activators
            .get(&device_name.to_lowercase())
            .ok_or_else(|| NotFound::Activator(device_name.to_string()))
    }

    /// Registered strategy, or the toggle fallback
    pub fn activator_for(&self, device_name: &str) -> &Activator {
        self.get_activator(device_name).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.activators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activators.is_empty()
    }
}

impl Default for ActivatorRegistry {
    fn default() -> Self {
        let mut registry = Self::new(ToggleActivator::default());
        registry.register(
            DUAL_REVERB_DEVICE,
            Activator::DualEngine(DualEngineActivator::default()),
        );
        registry
    }
}
