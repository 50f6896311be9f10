use serde::{Deserialize, Serialize};

use crate::midi::ControlChangeMessage;
use crate::model::{same_name, Device};

/// Two linked engines sharing one engine-select controller.
///
/// The controller takes one of three values: engine A alone, engine B alone,
/// or both engines in parallel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualEngineActivator {
    pub address: i32,
    pub engine_a: String,
    pub engine_b: String,
    pub solo_a_value: i32,
    pub solo_b_value: i32,
    pub both_value: i32,
}

impl Default for DualEngineActivator {
    fn default() -> Self {
        Self {
            address: 50,
            engine_a: "ReverbEngineA".to_string(),
            engine_b: "ReverbEngineB".to_string(),
            solo_a_value: 0,
            solo_b_value: 1,
            both_value: 2,
        }
    }
}

impl DualEngineActivator {
    /// `None` when the effect is unknown on the device or is not one of the engines
    pub fn build_activation_message(
        &self,
        device: &Device,
        effect_name: &str,
        activate: bool,
    ) -> Option<ControlChangeMessage> {
        let target = device.effect(effect_name)?;
        let is_a = if same_name(&target.name, &self.engine_a) {
            true
        } else if same_name(&target.name, &self.engine_b) {
            false
        } else {
            return None;
        };

        let partner = if is_a { &self.engine_b } else { &self.engine_a };
        // A partner missing from the device counts as inactive
        let partner_active = device.effect(partner).map(|e| e.active).unwrap_or(false);

        let value = match (activate, partner_active) {
            (true, true) => self.both_value,
            (true, false) => self.solo(is_a),
            (false, true) => self.solo(!is_a),
            (false, false) => self.solo_a_value,
        };

        Some(ControlChangeMessage::new(self.address, value))
    }

    fn solo(&self, engine_a: bool) -> i32 {
        if engine_a {
            self.solo_a_value
        } else {
            self.solo_b_value
        }
    }
}
