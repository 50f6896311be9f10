//! Error taxonomy for gateway operations
//!
//! Every error names the device/effect/setting involved so an operator can act
//! on it without re-deriving context. [`ControlError::category`] maps errors
//! onto the result classes reported to callers.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::midi::ControlChangeMessage;
use crate::store::StoreError;
use crate::transport::TransportError;

/// A lookup in the device model or the catalogs came up empty.
///
/// Configuration errors do not resolve themselves, so these are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotFound {
    #[error("device '{0}' not found")]
    Device(String),

    #[error("effect '{effect}' not found on device '{device}'")]
    Effect { device: String, effect: String },

    #[error("setting '{setting}' not found for effect '{effect}' on device '{device}'")]
    Setting {
        device: String,
        effect: String,
        setting: String,
    },

    #[error("selector '{0}' not found")]
    Selector(String),

    #[error("no selection in selector '{selector}' matches {wanted}")]
    Selection { selector: String, wanted: String },

    #[error("implementation mapping '{mapping}' not found for device '{device}'")]
    ImplementationMapping { device: String, mapping: String },

    #[error("no address for effect '{effect}' in implementation mapping '{mapping}' of device '{device}'")]
    AddressBinding {
        device: String,
        mapping: String,
        effect: String,
    },

    #[error("no activator registered for device '{0}'")]
    Activator(String),

    #[error("effect catalog entry '{0}' not found")]
    CatalogEntry(String),

    #[error("effect catalog entry '{mode}' has no binding for setting '{setting}' on device '{device}'")]
    DeviceSettingBinding {
        mode: String,
        setting: String,
        device: String,
    },
}

/// Caller-facing result classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NotFound,
    BadRequest,
    /// Transport failed before any state changed; safe to retry
    DeviceUnreachable,
    /// Persist failed but the device was compensated; safe to retry
    RecoverableError,
    /// Device and store disagree; needs an operator
    FatalInconsistency,
    /// Store could not be read before any state changed
    StoreUnavailable,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::BadRequest => "bad_request",
            ErrorCategory::DeviceUnreachable => "device_unreachable",
            ErrorCategory::RecoverableError => "recoverable_error",
            ErrorCategory::FatalInconsistency => "fatal_inconsistency",
            ErrorCategory::StoreUnavailable => "store_unavailable",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error of every gateway operation
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("device '{device}' unreachable during {operation}: {source}")]
    DeviceUnreachable {
        device: String,
        operation: String,
        #[source]
        source: TransportError,
    },

    #[error("persisting {operation} for device '{device}' failed, device reverted: {source}")]
    PersistFailedReverted {
        device: String,
        operation: String,
        #[source]
        source: StoreError,
    },

    #[error(
        "device '{device}' and store diverged during {operation}: persist failed ({persist_error}), \
         compensation failed ({compensation_error}); device is believed to hold {device_holds}"
    )]
    InconsistentState {
        device: String,
        operation: String,
        persist_error: StoreError,
        compensation_error: TransportError,
        device_holds: ControlChangeMessage,
    },

    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
}

impl ControlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ControlError::NotFound(_) => ErrorCategory::NotFound,
            ControlError::BadRequest(_) => ErrorCategory::BadRequest,
            ControlError::DeviceUnreachable { .. } => ErrorCategory::DeviceUnreachable,
            ControlError::PersistFailedReverted { .. } => ErrorCategory::RecoverableError,
            ControlError::InconsistentState { .. } => ErrorCategory::FatalInconsistency,
            ControlError::Store(_) => ErrorCategory::StoreUnavailable,
        }
    }

    /// Whether the caller may retry the same request automatically
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::DeviceUnreachable
                | ErrorCategory::RecoverableError
                | ErrorCategory::StoreUnavailable
        )
    }

    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::FatalInconsistency
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;
