//! Send-then-persist reconciliation
//!
//! The hardware cannot be read back, so every state change follows the same
//! order: send the CC message, apply the change to the in-memory device, persist
//! the whole device. When the persist fails, a compensating message puts the
//! device back to its previous value and the in-memory change is undone. Only
//! when that compensation fails as well do device and store disagree, and that
//! is always reported as [`ControlError::InconsistentState`].

use tracing::{error, info, warn};

use crate::context::RequestContext;
use crate::error::ControlError;
use crate::midi::ControlChangeMessage;
use crate::model::Device;
use crate::store::Repository;
use crate::transport::{OutputChannel, RetryPolicy};

/// One state change to reconcile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Human-readable description used in logs and errors
    pub operation: String,
    pub message: ControlChangeMessage,
    /// Message restoring the device's previous state
    pub compensation: ControlChangeMessage,
}

impl Change {
    /// Setting change: compensation re-sends the original value to the same address
    pub fn setting(operation: impl Into<String>, message: ControlChangeMessage, original_value: i32) -> Self {
        Self {
            operation: operation.into(),
            message,
            compensation: message.with_value(original_value),
        }
    }

    /// Activation change: compensation is the message the opposite request would send
    pub fn activation(
        operation: impl Into<String>,
        message: ControlChangeMessage,
        compensation: ControlChangeMessage,
    ) -> Self {
        Self {
            operation: operation.into(),
            message,
            compensation,
        }
    }
}

pub struct Reconciler<'a> {
    repo: &'a Repository,
    policy: RetryPolicy,
}

impl<'a> Reconciler<'a> {
    pub fn new(repo: &'a Repository, policy: RetryPolicy) -> Self {
        Self { repo, policy }
    }

    /// Drive `change` through send, apply, persist and, on persist failure,
    /// compensate and revert.
    ///
    /// On every error path `device` is left as it was before the call.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_with_compensation<A, R>(
        &self,
        ctx: &RequestContext,
        channel: &mut OutputChannel,
        device: &mut Device,
        change: &Change,
        close_after_send: bool,
        apply_local: A,
        revert_local: R,
    ) -> Result<(), ControlError>
    where
        A: FnOnce(&mut Device),
        R: FnOnce(&mut Device),
    {
        if let Err(source) = channel
            .send(ctx, change.message, &self.policy, close_after_send)
            .await
        {
            warn!(device = %device.name, operation = %change.operation, "Device unreachable: {}", source);
            return Err(ControlError::DeviceUnreachable {
                device: device.name.clone(),
                operation: change.operation.clone(),
                source,
            });
        }

        apply_local(&mut *device);

        let persist_error = match self.repo.save_device(ctx, device).await {
            Ok(()) => {
                info!(
                    device = %device.name,
                    operation = %change.operation,
                    message = %change.message,
                    "✅ Applied and persisted"
                );
                return Ok(());
            }
            Err(e) => e,
        };

        warn!(
            device = %device.name,
            operation = %change.operation,
            "Persist failed, compensating with {}: {}",
            change.compensation,
            persist_error
        );

        // The caller may have given up; the device still has to be put back
        let compensation = channel
            .send(&ctx.detached(), change.compensation, &self.policy, close_after_send)
            .await;
        revert_local(&mut *device);

        match compensation {
            Ok(()) => Err(ControlError::PersistFailedReverted {
                device: device.name.clone(),
                operation: change.operation.clone(),
                source: persist_error,
            }),
            Err(compensation_error) => {
                error!(
                    device = %device.name,
                    operation = %change.operation,
                    device_holds = %change.message,
                    "❌ Device and store diverged: compensation failed: {}",
                    compensation_error
                );
                Err(ControlError::InconsistentState {
                    device: device.name.clone(),
                    operation: change.operation.clone(),
                    persist_error,
                    compensation_error,
                    device_holds: change.message,
                })
            }
        }
    }
}
