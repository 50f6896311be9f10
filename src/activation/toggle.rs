use serde::{Deserialize, Serialize};

use crate::error::NotFound;
use crate::midi::ControlChangeMessage;
use crate::model::Device;

/// Plain on/off switch with no coupling between effects.
///
/// The address comes from the implementation mapping named `mapping`, bound
/// to the effect being switched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleActivator {
    pub mapping: String,
    pub on_value: i32,
    pub off_value: i32,
}

impl Default for ToggleActivator {
    fn default() -> Self {
        Self {
            mapping: "Active".to_string(),
            on_value: 127,
            off_value: 0,
        }
    }
}

impl ToggleActivator {
    pub fn build_activation_message(
        &self,
        device: &Device,
        effect_name: &str,
        activate: bool,
    ) -> Result<Option<ControlChangeMessage>, NotFound> {
        let Some(effect) = device.effect(effect_name) else {
            return Ok(None);
        };

        let mapping = device
            .mapping(&self.mapping)
            .ok_or_else(|| NotFound::ImplementationMapping {
                device: device.name.clone(),
                mapping: self.mapping.clone(),
            })?;
        let binding = mapping
            .binding(&effect.name)
            .ok_or_else(|| NotFound::AddressBinding {
                device: device.name.clone(),
                mapping: mapping.name.clone(),
                effect: effect.name.clone(),
            })?;

        let value = if activate { self.on_value } else { self.off_value };
        Ok(Some(ControlChangeMessage::new(binding.address, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_on_off_values() {
        let device = testing::pedal_device();
        let toggle = ToggleActivator::default();

        assert_eq!(
            toggle.build_activation_message(&device, "Delay", true).unwrap(),
            Some(ControlChangeMessage::new(102, 127))
        );
        assert_eq!(
            toggle.build_activation_message(&device, "delay", false).unwrap(),
            Some(ControlChangeMessage::new(102, 0))
        );
    }

    #[test]
    fn test_unknown_effect_yields_nothing() {
        let device = testing::pedal_device();
        assert_eq!(
            ToggleActivator::default()
                .build_activation_message(&device, "Flanger", true)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_missing_mapping_is_not_found() {
        let device = testing::ventris_device();
        let err = ToggleActivator::default()
            .build_activation_message(&device, "ReverbEngineA", true)
            .unwrap_err();
        assert!(matches!(err, NotFound::ImplementationMapping { .. }));
    }
}
