//! Reset a device to its defaults
//!
//! Effects and their settings are walked in declaration order. Anything already
//! at its default is skipped without touching the hardware. Each remaining item
//! goes through the reconciler on a channel that stays open for the whole walk.
//! Recoverable failures are collected into the [`ResetReport`]; a divergence
//! between device and store stops the walk immediately.

use serde::Serialize;
use tracing::{info, warn, Instrument};

use super::{activation_change, apply_writes, revert_writes, setting_writes, MidiFxController};
use crate::context::RequestContext;
use crate::error::{ControlError, ErrorCategory};
use crate::model::Device;
use crate::reconcile::{Change, Reconciler};
use crate::resolver::SettingResolver;
use crate::transport::{OutputChannel, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetOutcome {
    Success,
    PartialFailure,
}

/// One effect or setting that could not be reset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetFailure {
    pub effect: String,
    /// `None` when the effect's activation failed
    pub setting: Option<String>,
    pub category: ErrorCategory,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub device: String,
    /// Items brought to default and persisted
    pub applied: usize,
    /// Items already at default
    pub skipped: usize,
    pub failures: Vec<ResetFailure>,
    /// The walk stopped early because the request was cancelled
    pub cancelled: bool,
}

impl ResetReport {
    fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            applied: 0,
            skipped: 0,
            failures: Vec::new(),
            cancelled: false,
        }
    }

    pub fn outcome(&self) -> ResetOutcome {
        if self.failures.is_empty() {
            ResetOutcome::Success
        } else {
            ResetOutcome::PartialFailure
        }
    }

    fn record(&mut self, effect: &str, setting: Option<&str>, error: &ControlError) {
        warn!(
            device = %self.device,
            effect = %effect,
            setting = setting.unwrap_or("-"),
            category = %error.category(),
            "Reset step failed: {}",
            error
        );
        self.failures.push(ResetFailure {
            effect: effect.to_string(),
            setting: setting.map(str::to_string),
            category: error.category(),
            message: error.to_string(),
        });
        if matches!(
            error,
            ControlError::DeviceUnreachable {
                source: TransportError::Cancelled(_),
                ..
            }
        ) {
            self.cancelled = true;
        }
    }

    /// True once `ctx` is cancelled; the cancellation is recorded only once
    fn stop_if_cancelled(&mut self, ctx: &RequestContext, channel: &str, effect: &str) -> bool {
        if !ctx.is_cancelled() {
            return false;
        }
        if !self.cancelled {
            let error = ControlError::DeviceUnreachable {
                device: self.device.clone(),
                operation: "reset".to_string(),
                source: TransportError::Cancelled(channel.to_string()),
            };
            self.record(effect, None, &error);
        }
        true
    }
}

impl MidiFxController {
    /// Restore every effect and setting of a device to its defaults.
    ///
    /// Returns the aggregate report for completed walks (successful or not).
    /// `Err` means the walk never started or was aborted on a device/store
    /// divergence, which is returned as [`ControlError::InconsistentState`].
    pub async fn reset_device(&self, ctx: &RequestContext, device_name: &str) -> Result<ResetReport, ControlError> {
        self.reset_locked(ctx, device_name)
            .instrument(ctx.span("reset_device"))
            .await
    }

    async fn reset_locked(&self, ctx: &RequestContext, device_name: &str) -> Result<ResetReport, ControlError> {
        let (mut channel, mut device) = self.lock_device(ctx, device_name).await?;
        info!(device = %device.name, "🔄 Resetting device to defaults");

        let mut report = ResetReport::new(&device.name);
        let walked = self.reset_walk(ctx, &mut channel, &mut device, &mut report).await;
        channel.close();
        walked?;

        info!(
            device = %report.device,
            applied = report.applied,
            skipped = report.skipped,
            failures = report.failures.len(),
            "Reset finished: {:?}",
            report.outcome()
        );
        Ok(report)
    }

    async fn reset_walk(
        &self,
        ctx: &RequestContext,
        channel: &mut OutputChannel,
        device: &mut Device,
        report: &mut ResetReport,
    ) -> Result<(), ControlError> {
        let reconciler = self.reconciler();
        let activator = self.activators.activator_for(&device.name);

        for ei in 0..device.effects.len() {
            let effect_name = device.effects[ei].name.clone();
            if report.stop_if_cancelled(ctx, channel.name(), &effect_name) {
                return Ok(());
            }
            let (active, default_active) = (device.effects[ei].active, device.effects[ei].default_active);

            if active == default_active {
                report.skipped += 1;
            } else {
                match activation_change(activator, device, ei, default_active) {
                    Ok(Some(change)) => {
                        let result = reconciler
                            .apply_with_compensation(
                                ctx,
                                channel,
                                device,
                                &change,
                                false,
                                |d| d.effects[ei].active = default_active,
                                |d| d.effects[ei].active = active,
                            )
                            .await;
                        tally(report, &effect_name, None, result)?;
                    }
                    Ok(None) => {
                        // No command drives this effect, only the stored flag moves
                        info!(device = %device.name, effect = %effect_name, "Nothing to send, storing default flag");
                        device.effects[ei].active = default_active;
                        match self.repo.save_device(ctx, device).await {
                            Ok(()) => report.applied += 1,
                            Err(e) => {
                                device.effects[ei].active = active;
                                report.record(&effect_name, None, &e.into());
                            }
                        }
                    }
                    Err(e) => report.record(&effect_name, None, &e.into()),
                }
            }

            self.reset_settings(ctx, &reconciler, channel, device, ei, report)
                .await?;
        }
        Ok(())
    }

    async fn reset_settings(
        &self,
        ctx: &RequestContext,
        reconciler: &Reconciler<'_>,
        channel: &mut OutputChannel,
        device: &mut Device,
        ei: usize,
        report: &mut ResetReport,
    ) -> Result<(), ControlError> {
        let resolver = SettingResolver::new(&self.repo);
        let effect_name = device.effects[ei].name.clone();

        for si in 0..device.effects[ei].settings.len() {
            if report.stop_if_cancelled(ctx, channel.name(), &effect_name) {
                return Ok(());
            }
            let setting = &device.effects[ei].settings[si];
            if setting.is_at_default() {
                report.skipped += 1;
                continue;
            }
            let setting_name = setting.name.clone();
            let (value, default_value) = (setting.value, setting.default_value);

            let message = match resolver
                .resolve(ctx, device, &effect_name, &setting_name, default_value)
                .await
            {
                Ok(message) => message,
                Err(e) => {
                    report.record(&effect_name, Some(setting_name.as_str()), &e);
                    continue;
                }
            };

            let writes = setting_writes(device, ei, si, default_value);
            let change = Change::setting(
                format!("reset of setting '{}' of effect '{}'", setting_name, effect_name),
                message,
                value,
            );
            let result = reconciler
                .apply_with_compensation(
                    ctx,
                    channel,
                    device,
                    &change,
                    false,
                    |d| apply_writes(d, ei, &writes),
                    |d| revert_writes(d, ei, &writes),
                )
                .await;
            tally(report, &effect_name, Some(setting_name.as_str()), result)?;
        }
        Ok(())
    }
}

/// Count a step's result; only a divergence is propagated
fn tally(
    report: &mut ResetReport,
    effect: &str,
    setting: Option<&str>,
    result: Result<(), ControlError>,
) -> Result<(), ControlError> {
    match result {
        Ok(()) => {
            report.applied += 1;
            Ok(())
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            report.record(effect, setting, &e);
            Ok(())
        }
    }
}
