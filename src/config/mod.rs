//! Configuration management for MidiFX GW
//!
//! Loads and validates the YAML configuration: where the document store lives,
//! how the transport talks to the hardware, and which activation strategy each
//! device family uses.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::activation::{Activator, ActivatorRegistry, DualEngineActivator, ToggleActivator, DUAL_REVERB_DEVICE};
use crate::midi::DATA_BYTE_MAX;
use crate::paths::AppPaths;
use crate::transport::RetryPolicy;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    /// Fallback strategy for devices without a registration
    #[serde(default)]
    pub activation: ToggleActivator,
    #[serde(default = "default_activators")]
    pub activators: Vec<ActivatorRegistration>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Document directory; the platform data directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// MIDI output configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransportConfig {
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// 1-based MIDI channel all Control-Change events go out on
    #[serde(default = "default_midi_channel")]
    pub midi_channel: u8,
    /// Attempts per send, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            midi_channel: default_midi_channel(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Device name bound to an activation strategy
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActivatorRegistration {
    pub device: String,
    #[serde(flatten)]
    pub activator: Activator,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            transport: TransportConfig::default(),
            activation: ToggleActivator::default(),
            activators: default_activators(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let transport = &self.transport;
        if transport.client_name.is_empty() {
            anyhow::bail!("transport client_name cannot be empty");
        }
        if !(1..=16).contains(&transport.midi_channel) {
            anyhow::bail!(
                "transport midi_channel {} is invalid (must be 1-16)",
                transport.midi_channel
            );
        }
        if transport.max_retries == 0 {
            anyhow::bail!("transport max_retries must be at least 1");
        }

        validate_toggle(&self.activation).context("Invalid default activation")?;

        let mut seen = HashSet::new();
        for registration in &self.activators {
            if registration.device.is_empty() {
                anyhow::bail!("Activator device name cannot be empty");
            }
            if !seen.insert(registration.device.to_lowercase()) {
                anyhow::bail!("Device '{}' has more than one activator", registration.device);
            }

            match &registration.activator {
                Activator::Toggle(toggle) => validate_toggle(toggle),
                Activator::DualEngine(dual) => validate_dual_engine(dual),
            }
            .with_context(|| format!("Invalid activator for device '{}'", registration.device))?;
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.transport.max_retries,
            delay: Duration::from_millis(self.transport.retry_delay_ms),
        }
    }

    pub fn activator_registry(&self) -> ActivatorRegistry {
        let mut registry = ActivatorRegistry::new(self.activation.clone());
        for registration in &self.activators {
            registry.register(&registration.device, registration.activator.clone());
        }
        registry
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store
            .dir
            .clone()
            .unwrap_or_else(|| AppPaths::detect().store_dir)
    }
}

fn check_data_byte(what: &str, value: i32) -> Result<()> {
    if !(0..=DATA_BYTE_MAX).contains(&value) {
        anyhow::bail!("{} {} is invalid (must be 0-127)", what, value);
    }
    Ok(())
}

fn validate_toggle(toggle: &ToggleActivator) -> Result<()> {
    if toggle.mapping.is_empty() {
        anyhow::bail!("mapping cannot be empty");
    }
    check_data_byte("on_value", toggle.on_value)?;
    check_data_byte("off_value", toggle.off_value)
}

fn validate_dual_engine(dual: &DualEngineActivator) -> Result<()> {
    if dual.engine_a.is_empty() || dual.engine_b.is_empty() {
        anyhow::bail!("engine names cannot be empty");
    }
    if dual.engine_a.eq_ignore_ascii_case(&dual.engine_b) {
        anyhow::bail!("engine_a and engine_b must differ");
    }
    check_data_byte("address", dual.address)?;
    check_data_byte("solo_a_value", dual.solo_a_value)?;
    check_data_byte("solo_b_value", dual.solo_b_value)?;
    check_data_byte("both_value", dual.both_value)
}

fn default_client_name() -> String { "MidiFX-GW".to_string() }
fn default_midi_channel() -> u8 { 1 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 50 }

fn default_activators() -> Vec<ActivatorRegistration> {
    vec![ActivatorRegistration {
        device: DUAL_REVERB_DEVICE.to_string(),
        activator: Activator::DualEngine(DualEngineActivator::default()),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        config.validate().unwrap();

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay, Duration::from_millis(50));
        assert!(config.activator_registry().get_activator("VentrisDualReverb").is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
store:
  dir: /var/lib/midifx
transport:
  client_name: Rig
  midi_channel: 2
  max_retries: 5
  retry_delay_ms: 20
activation:
  mapping: Bypass
  on_value: 0
  off_value: 127
activators:
  - device: VentrisDualReverb
    strategy: dual_engine
    both_value: 3
  - device: Timeline
    strategy: toggle
    mapping: Engage
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.store_dir(), PathBuf::from("/var/lib/midifx"));
        assert_eq!(config.transport.midi_channel, 2);
        assert_eq!(config.activation.mapping, "Bypass");

        let registry = config.activator_registry();
        match registry.get_activator("ventrisdualreverb").unwrap() {
            Activator::DualEngine(dual) => {
                assert_eq!(dual.both_value, 3);
                assert_eq!(dual.address, 50);
            }
            other => panic!("unexpected activator: {other:?}"),
        }
        match registry.activator_for("Timeline") {
            Activator::Toggle(toggle) => {
                assert_eq!(toggle.mapping, "Engage");
                assert_eq!(toggle.on_value, 127);
            }
            other => panic!("unexpected activator: {other:?}"),
        }
        match registry.activator_for("Unregistered") {
            Activator::Toggle(toggle) => assert_eq!(toggle.mapping, "Bypass"),
            other => panic!("unexpected activator: {other:?}"),
        }
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.transport.midi_channel = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transport.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.activation.on_value = 128;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.activators.push(ActivatorRegistration {
            device: "ventrisdualreverb".into(),
            activator: Activator::Toggle(ToggleActivator::default()),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than one activator"));

        let mut config = AppConfig::default();
        config.activators[0].activator = Activator::DualEngine(DualEngineActivator {
            engine_b: "reverbenginea".into(),
            ..DualEngineActivator::default()
        });
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("midifx.yaml");

        let mut config = AppConfig::default();
        config.transport.midi_channel = 10;
        config.save(&path).await.unwrap();

        assert_eq!(AppConfig::load(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_load_missing_file_names_path() {
        let err = AppConfig::load("/nonexistent/midifx.yaml").await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/midifx.yaml"));
    }
}
