//! Device documents: implementation mappings, effects and settings

use serde::{Deserialize, Serialize};

use super::same_name;

/// A controllable piece of outboard hardware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Device {
    /// Unique key of the device document
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Output channel name the transport opens (exact or prefix match)
    #[serde(alias = "MidiConnectName")]
    pub connect_name: String,
    #[serde(default, alias = "MidiImplementation")]
    pub implementation_mappings: Vec<ImplementationMapping>,
    #[serde(default, alias = "DeviceEffects")]
    pub effects: Vec<Effect>,
}

impl Device {
    pub fn effect(&self, name: &str) -> Option<&Effect> {
        self.effects.iter().find(|e| same_name(&e.name, name))
    }

    pub fn effect_index(&self, name: &str) -> Option<usize> {
        self.effects.iter().position(|e| same_name(&e.name, name))
    }

    pub fn mapping(&self, name: &str) -> Option<&ImplementationMapping> {
        self.implementation_mappings
            .iter()
            .find(|m| same_name(&m.name, name))
    }

    /// True when every effect and setting already sits at its default
    pub fn is_at_defaults(&self) -> bool {
        self.effects.iter().all(Effect::is_at_defaults)
    }
}

/// Per-device configuration key binding effect names to CC addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImplementationMapping {
    pub name: String,
    #[serde(default, alias = "ControlChangeAddresses")]
    pub bindings: Vec<AddressBinding>,
    #[serde(default, alias = "ControlChangeValueDefault", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<i32>,
    #[serde(default, alias = "ControlChangeValueMax", skip_serializing_if = "Option::is_none")]
    pub maximum_value: Option<i32>,
    /// Selector giving symbolic names to this mapping's values
    #[serde(default, alias = "ControlChangeValueSelector", skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl ImplementationMapping {
    pub fn binding(&self, effect_name: &str) -> Option<&AddressBinding> {
        self.bindings
            .iter()
            .find(|b| same_name(&b.effect_name, effect_name))
    }
}

/// Effect name to CC address (0-127)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddressBinding {
    #[serde(alias = "Name")]
    pub effect_name: String,
    #[serde(alias = "Value")]
    pub address: i32,
}

/// A device-local effect with its on/off state and settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Effect {
    pub name: String,
    pub active: bool,
    #[serde(default)]
    pub default_active: bool,
    #[serde(default, alias = "EffectSettings", alias = "DeviceEffectSettings")]
    pub settings: Vec<Setting>,
}

impl Effect {
    pub fn setting(&self, name: &str) -> Option<&Setting> {
        self.settings.iter().find(|s| same_name(&s.name, name))
    }

    pub fn setting_index(&self, name: &str) -> Option<usize> {
        self.settings.iter().position(|s| same_name(&s.name, name))
    }

    pub fn is_at_defaults(&self) -> bool {
        self.active == self.default_active && self.settings.iter().all(Setting::is_at_default)
    }
}

/// A single effect parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Setting {
    pub name: String,
    pub value: i32,
    pub default_value: i32,
    /// Sibling setting whose current value selects this setting's meaning
    #[serde(
        default,
        alias = "DeviceEffectSettingDependencyName",
        skip_serializing_if = "Option::is_none"
    )]
    pub dependency_name: Option<String>,
    /// Siblings restored to their defaults (store only) whenever this setting changes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resets: Vec<String>,
}

impl Setting {
    pub fn is_at_default(&self) -> bool {
        self.value == self.default_value
    }
}
