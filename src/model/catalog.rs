//! Shared catalogs: selectors and effect catalog entries

use serde::{Deserialize, Serialize};

use super::same_name;

/// Translates a setting's raw value into a symbolic mode name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Selector {
    pub name: String,
    #[serde(default)]
    pub selections: Vec<Selection>,
}

impl Selector {
    /// Selection whose value equals `value` exactly
    pub fn selection_for_value(&self, value: i32) -> Option<&Selection> {
        self.selections
            .iter()
            .find(|s| s.control_change_message_value == value)
    }

    pub fn selection_named(&self, name: &str) -> Option<&Selection> {
        self.selections.iter().find(|s| same_name(&s.name, name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Selection {
    pub name: String,
    pub control_change_message_value: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_change_message_maximum_value: Option<i32>,
}

/// Per-mode table telling which implementation mapping a setting uses while
/// that mode is selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EffectCatalogEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "DeviceSettings")]
    pub bindings: Vec<DeviceSettingBinding>,
}

impl EffectCatalogEntry {
    pub fn binding_for(&self, setting_name: &str, device_name: &str) -> Option<&DeviceSettingBinding> {
        self.bindings.iter().find(|b| {
            same_name(&b.setting_name, setting_name) && same_name(&b.device_name, device_name)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceSettingBinding {
    #[serde(alias = "Name")]
    pub setting_name: String,
    pub device_name: String,
    pub effect_name: String,
    #[serde(alias = "DeviceMidiImplementationName")]
    pub implementation_mapping_name: String,
}
