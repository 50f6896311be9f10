//! Setting to CC address resolution
//!
//! A setting without a dependency uses the implementation mapping named after
//! itself. A setting with a dependency changes meaning with the dependency's
//! current value:
//!
//! ```text
//! dependency value -> Selector (named after the dependency) -> Selection name (mode)
//!                  -> EffectCatalogEntry (mode) -> DeviceSettingBinding (setting, device)
//!                  -> implementation mapping name -> AddressBinding (effect) -> address
//! ```

use tracing::debug;

use crate::context::RequestContext;
use crate::error::{ControlError, NotFound};
use crate::midi::ControlChangeMessage;
use crate::model::{Device, Setting};
use crate::store::Repository;

pub struct SettingResolver<'a> {
    repo: &'a Repository,
}

impl<'a> SettingResolver<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    /// CC address currently carrying `setting_name` of `effect_name`
    pub async fn resolve_address(
        &self,
        ctx: &RequestContext,
        device: &Device,
        effect_name: &str,
        setting_name: &str,
    ) -> Result<i32, ControlError> {
        let setting = find_setting(device, effect_name, setting_name)?;

        let Some(dependency_name) = setting.dependency_name.as_deref() else {
            return Ok(lookup_address(device, &setting.name, effect_name)?);
        };

        let dependency = find_setting(device, effect_name, dependency_name)?;
        let selector = self.repo.load_selector(ctx, &dependency.name).await?;
        let mode = selector
            .selection_for_value(dependency.value)
            .ok_or_else(|| NotFound::Selection {
                selector: selector.name.clone(),
                wanted: format!("value {}", dependency.value),
            })?;

        let entry = self.repo.load_effect_entry(ctx, &mode.name).await?;
        let binding = entry
            .binding_for(&setting.name, &device.name)
            .ok_or_else(|| NotFound::DeviceSettingBinding {
                mode: entry.name.clone(),
                setting: setting.name.clone(),
                device: device.name.clone(),
            })?;

        debug!(
            device = %device.name,
            setting = %setting.name,
            mode = %mode.name,
            mapping = %binding.implementation_mapping_name,
            "Dependent setting resolved through mode"
        );

        Ok(lookup_address(device, &binding.implementation_mapping_name, effect_name)?)
    }

    /// Message setting `setting_name` to `value`; the value is passed through unchecked
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        device: &Device,
        effect_name: &str,
        setting_name: &str,
        value: i32,
    ) -> Result<ControlChangeMessage, ControlError> {
        let address = self.resolve_address(ctx, device, effect_name, setting_name).await?;
        Ok(ControlChangeMessage::new(address, value))
    }

    /// Value of the selection named `selection_name` in the selector named after the setting
    pub async fn resolve_selection(
        &self,
        ctx: &RequestContext,
        setting_name: &str,
        selection_name: &str,
    ) -> Result<i32, ControlError> {
        let selector = self.repo.load_selector(ctx, setting_name).await?;
        let selection = selector
            .selection_named(selection_name)
            .ok_or_else(|| NotFound::Selection {
                selector: selector.name.clone(),
                wanted: format!("name '{}'", selection_name),
            })?;
        Ok(selection.control_change_message_value)
    }
}

pub fn find_setting<'d>(
    device: &'d Device,
    effect_name: &str,
    setting_name: &str,
) -> Result<&'d Setting, NotFound> {
    let effect = device.effect(effect_name).ok_or_else(|| NotFound::Effect {
        device: device.name.clone(),
        effect: effect_name.to_string(),
    })?;
    effect.setting(setting_name).ok_or_else(|| NotFound::Setting {
        device: device.name.clone(),
        effect: effect.name.clone(),
        setting: setting_name.to_string(),
    })
}

/// Address bound to `effect_name` in the mapping `mapping_name`
pub fn lookup_address(device: &Device, mapping_name: &str, effect_name: &str) -> Result<i32, NotFound> {
    let mapping = device
        .mapping(mapping_name)
        .ok_or_else(|| NotFound::ImplementationMapping {
            device: device.name.clone(),
            mapping: mapping_name.to_string(),
        })?;

    mapping
        .binding(effect_name)
        .map(|b| b.address)
        .ok_or_else(|| NotFound::AddressBinding {
            device: device.name.clone(),
            mapping: mapping.name.clone(),
            effect: effect_name.to_string(),
        })
}
