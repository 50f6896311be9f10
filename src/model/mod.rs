//! Persisted configuration model
//!
//! Devices (with their effects and settings) plus the shared catalogs used to
//! resolve context-dependent settings. Documents use PascalCase field names and
//! also accept the legacy field names of older device uploads.

mod catalog;
mod device;

pub use catalog::{DeviceSettingBinding, EffectCatalogEntry, Selection, Selector};
pub use device::{AddressBinding, Device, Effect, ImplementationMapping, Setting};

/// Case-insensitive name comparison used for every model lookup
pub(crate) fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
