//! Gateway operations
//!
//! [`MidiFxController`] is the entry point for every request: effect
//! activation, setting changes, raw sends and device resets. Each operation
//! loads the device, takes the per-device channel lock, and runs its changes
//! through the [`Reconciler`].

mod reset;

pub use reset::{ResetFailure, ResetOutcome, ResetReport};

use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn, Instrument};

use crate::activation::{Activator, ActivatorRegistry};
use crate::config::AppConfig;
use crate::context::RequestContext;
use crate::error::{ControlError, NotFound};
use crate::midi::ControlChangeMessage;
use crate::model::Device;
use crate::reconcile::{Change, Reconciler};
use crate::resolver::{find_setting, lookup_address, SettingResolver};
use crate::store::{FileStore, Repository};
use crate::transport::{ChannelRegistry, MidirBackend, OutputChannel, RetryPolicy, TransportError};

/// Result of an activation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Applied(ControlChangeMessage),
    /// The device's activator had nothing to send for this effect
    NothingToSend,
}

/// A setting change, by raw value or by selection name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSettingRequest {
    pub device: String,
    pub effect: String,
    pub setting: String,
    pub value: Option<i32>,
    /// Selection of the selector named after the setting; ignored when `value` is set
    pub selection: Option<String>,
}

impl SetSettingRequest {
    pub fn value(device: &str, effect: &str, setting: &str, value: i32) -> Self {
        Self {
            device: device.to_string(),
            effect: effect.to_string(),
            setting: setting.to_string(),
            value: Some(value),
            selection: None,
        }
    }

    pub fn selection(device: &str, effect: &str, setting: &str, selection: &str) -> Self {
        Self {
            device: device.to_string(),
            effect: effect.to_string(),
            setting: setting.to_string(),
            value: None,
            selection: Some(selection.to_string()),
        }
    }
}

pub struct MidiFxController {
    repo: Repository,
    activators: ActivatorRegistry,
    channels: ChannelRegistry,
    policy: RetryPolicy,
}

impl MidiFxController {
    pub fn new(
        repo: Repository,
        activators: ActivatorRegistry,
        channels: ChannelRegistry,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            repo,
            activators,
            channels,
            policy,
        }
    }

    /// Controller over the file store and system MIDI ports named in `config`
    pub fn from_config(config: &AppConfig) -> Self {
        let store_dir = config.store_dir();
        info!("📁 Document store: {}", store_dir.display());

        let repo = Repository::new(Arc::new(FileStore::new(store_dir)));
        let backend = Arc::new(MidirBackend::new(config.transport.client_name.clone()));
        let channels = ChannelRegistry::new(backend, config.transport.midi_channel);

        Self::new(
            repo,
            config.activator_registry(),
            channels,
            config.retry_policy(),
        )
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn list_ports(&self) -> Result<Vec<String>, TransportError> {
        self.channels.list_ports()
    }

    /// Release every output channel not held by a running operation
    pub fn shutdown(&self) {
        info!(channels = self.channels.len(), "Closing output channels");
        self.channels.close_all();
    }

    /// Turn an effect on or off and persist its `Active` flag
    pub async fn activate_effect(
        &self,
        ctx: &RequestContext,
        device_name: &str,
        effect_name: &str,
        active: bool,
    ) -> Result<ActivationOutcome, ControlError> {
        self.apply_activation(ctx, device_name, effect_name, active)
            .instrument(ctx.span("activate_effect"))
            .await
    }

    /// Set a setting by value or selection, resetting any siblings it lists in `Resets`
    pub async fn set_setting(
        &self,
        ctx: &RequestContext,
        request: &SetSettingRequest,
    ) -> Result<ControlChangeMessage, ControlError> {
        self.apply_setting(ctx, request)
            .instrument(ctx.span("set_setting"))
            .await
    }

    /// Send an unpersisted CC message to an output channel
    pub async fn send_raw(
        &self,
        ctx: &RequestContext,
        connect_name: &str,
        message: ControlChangeMessage,
    ) -> Result<(), ControlError> {
        let mut channel = self.channels.acquire(connect_name).await;
        channel
            .send(ctx, message, &self.policy, true)
            .instrument(ctx.span("send_raw"))
            .await
            .map_err(|source| ControlError::DeviceUnreachable {
                device: connect_name.to_string(),
                operation: format!("raw send of {}", message),
                source,
            })
    }

    async fn apply_activation(
        &self,
        ctx: &RequestContext,
        device_name: &str,
        effect_name: &str,
        active: bool,
    ) -> Result<ActivationOutcome, ControlError> {
        let (mut channel, mut device) = self.lock_device(ctx, device_name).await?;
        let index = device.effect_index(effect_name).ok_or_else(|| NotFound::Effect {
            device: device.name.clone(),
            effect: effect_name.to_string(),
        })?;

        let activator = self.activators.activator_for(&device.name);
        let Some(change) = activation_change(activator, &device, index, active)? else {
            info!(device = %device.name, effect = %effect_name, "Nothing to send");
            return Ok(ActivationOutcome::NothingToSend);
        };

        let original = device.effects[index].active;
        self.reconciler()
            .apply_with_compensation(
                ctx,
                &mut channel,
                &mut device,
                &change,
                true,
                |d| d.effects[index].active = active,
                |d| d.effects[index].active = original,
            )
            .await?;

        Ok(ActivationOutcome::Applied(change.message))
    }

    async fn apply_setting(
        &self,
        ctx: &RequestContext,
        request: &SetSettingRequest,
    ) -> Result<ControlChangeMessage, ControlError> {
        if request.value.is_none() && request.selection.is_none() {
            return Err(missing_value(request));
        }

        let (mut channel, mut device) = self.lock_device(ctx, &request.device).await?;
        let resolver = SettingResolver::new(&self.repo);

        let message = match request.value {
            Some(value) => {
                resolver
                    .resolve(ctx, &device, &request.effect, &request.setting, value)
                    .await?
            }
            None => {
                let selection = request
                    .selection
                    .as_deref()
                    .ok_or_else(|| missing_value(request))?;
                let setting = find_setting(&device, &request.effect, &request.setting)?;
                let value = resolver.resolve_selection(ctx, &setting.name, selection).await?;
                let address = lookup_address(&device, &setting.name, &request.effect)?;
                ControlChangeMessage::new(address, value)
            }
        };

        let (effect_index, setting_index) =
            setting_position(&device, &request.effect, &request.setting)?;
        let writes = setting_writes(&device, effect_index, setting_index, message.value);
        let change = Change::setting(
            format!(
                "setting '{}' of effect '{}'",
                request.setting, request.effect
            ),
            message,
            writes[0].original,
        );

        self.reconciler()
            .apply_with_compensation(
                ctx,
                &mut channel,
                &mut device,
                &change,
                true,
                |d| apply_writes(d, effect_index, &writes),
                |d| revert_writes(d, effect_index, &writes),
            )
            .await?;

        Ok(message)
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.repo, self.policy)
    }

    /// Channel lock for the device plus the device as stored once the lock is held
    async fn lock_device(
        &self,
        ctx: &RequestContext,
        device_name: &str,
    ) -> Result<(OwnedMutexGuard<OutputChannel>, Device), ControlError> {
        let device = self.repo.load_device(ctx, device_name).await?;
        let channel = self.channels.acquire(&device.connect_name).await;
        // Another request may have written the device while we waited for the lock
        let device = self.repo.load_device(ctx, device_name).await?;
        Ok((channel, device))
    }
}

/// Change moving effect `index` to `active`, compensated by the message for its current state
fn activation_change(
    activator: &Activator,
    device: &Device,
    index: usize,
    active: bool,
) -> Result<Option<Change>, NotFound> {
    let effect = &device.effects[index];
    let Some(message) = activator.build_activation_message(device, &effect.name, active)? else {
        return Ok(None);
    };
    let compensation = activator
        .build_activation_message(device, &effect.name, effect.active)?
        .unwrap_or(message);

    let verb = if active { "activation" } else { "deactivation" };
    Ok(Some(Change::activation(
        format!("{} of effect '{}'", verb, effect.name),
        message,
        compensation,
    )))
}

fn missing_value(request: &SetSettingRequest) -> ControlError {
    ControlError::BadRequest(format!(
        "setting '{}' needs either a value or a selection",
        request.setting
    ))
}

fn setting_position(device: &Device, effect_name: &str, setting_name: &str) -> Result<(usize, usize), NotFound> {
    let effect_index = device.effect_index(effect_name).ok_or_else(|| NotFound::Effect {
        device: device.name.clone(),
        effect: effect_name.to_string(),
    })?;
    let setting_index = device.effects[effect_index]
        .setting_index(setting_name)
        .ok_or_else(|| NotFound::Setting {
            device: device.name.clone(),
            effect: device.effects[effect_index].name.clone(),
            setting: setting_name.to_string(),
        })?;
    Ok((effect_index, setting_index))
}

/// One persisted value change within an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SettingWrite {
    index: usize,
    original: i32,
    updated: i32,
}

/// The trigger's own write first, then a write back to default for every
/// sibling listed in its `Resets`.
///
/// Siblings get no command of their own: the hardware is assumed to drop them
/// when the trigger changes.
fn setting_writes(device: &Device, effect_index: usize, setting_index: usize, value: i32) -> Vec<SettingWrite> {
    let effect = &device.effects[effect_index];
    let trigger = &effect.settings[setting_index];

    let mut writes = vec![SettingWrite {
        index: setting_index,
        original: trigger.value,
        updated: value,
    }];

    for name in &trigger.resets {
        match effect.setting_index(name) {
            Some(index) if index != setting_index => {
                let sibling = &effect.settings[index];
                writes.push(SettingWrite {
                    index,
                    original: sibling.value,
                    updated: sibling.default_value,
                });
            }
            Some(_) => {}
            None => warn!(
                device = %device.name,
                effect = %effect.name,
                setting = %trigger.name,
                "Reset target '{}' does not exist",
                name
            ),
        }
    }
    writes
}

fn apply_writes(device: &mut Device, effect_index: usize, writes: &[SettingWrite]) {
    let settings = &mut device.effects[effect_index].settings;
    for write in writes {
        settings[write.index].value = write.updated;
    }
}

fn revert_writes(device: &mut Device, effect_index: usize, writes: &[SettingWrite]) {
    let settings = &mut device.effects[effect_index].settings;
    for write in writes.iter().rev() {
        settings[write.index].value = write.original;
    }
}
