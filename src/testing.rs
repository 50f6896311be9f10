//! Test doubles and fixtures shared by the unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::activation::ActivatorRegistry;
use crate::context::RequestContext;
use crate::midi::ControlChangeMessage;
use crate::model::{
    AddressBinding, Device, DeviceSettingBinding, Effect, EffectCatalogEntry, ImplementationMapping, Selection,
    Selector, Setting,
};
use crate::service::MidiFxController;
use crate::store::{DocumentStore, MemoryStore, Repository, StoreError, StoreRequest};
use crate::transport::{ChannelRegistry, PortBackend, PortConnection, RetryPolicy, TransportError};

#[derive(Debug, Default)]
struct ScriptState {
    sent: Vec<Vec<u8>>,
    attempts: u32,
    connects: u32,
    open_now: usize,
    max_open: usize,
    fail_next: u32,
    fail_always: bool,
    ok_before_failing: Option<u32>,
    connect_limit: Option<u32>,
}

impl ScriptState {
    fn next_send_fails(&mut self) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        match self.ok_before_failing.as_mut() {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => self.fail_always,
        }
    }
}

/// Port backend recording every frame, with scriptable send failures
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    ports: Vec<String>,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBackend {
    pub fn new(ports: &[&str]) -> Self {
        Self {
            ports: ports.iter().map(|p| p.to_string()).collect(),
            state: Arc::default(),
        }
    }

    pub fn shared(&self) -> Arc<dyn PortBackend> {
        Arc::new(self.clone())
    }

    /// The next `n` sends fail
    pub fn fail_next(&self, n: u32) {
        self.state.lock().fail_next = n;
    }

    pub fn fail_always(&self, fail: bool) {
        self.state.lock().fail_always = fail;
    }

    /// `n` more sends succeed, every one after that fails
    pub fn succeed_then_fail(&self, n: u32) {
        self.state.lock().ok_before_failing = Some(n);
    }

    /// Opens fail once `n` connections have been made
    pub fn refuse_connects_after(&self, n: u32) {
        self.state.lock().connect_limit = Some(n);
    }

    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    pub fn sent_messages(&self) -> Vec<ControlChangeMessage> {
        self.sent_frames()
            .iter()
            .filter_map(|frame| ControlChangeMessage::decode(frame))
            .collect()
    }

    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().connects
    }

    pub fn open_connections(&self) -> usize {
        self.state.lock().open_now
    }

    pub fn max_open_connections(&self) -> usize {
        self.state.lock().max_open
    }
}

impl PortBackend for ScriptedBackend {
    fn output_ports(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.ports.clone())
    }

    fn connect(&self, port_name: &str) -> Result<Box<dyn PortConnection>, TransportError> {
        if !self.ports.iter().any(|p| p == port_name) {
            return Err(TransportError::ChannelNotFound(port_name.to_string()));
        }
        let mut state = self.state.lock();
        if state.connect_limit.is_some_and(|limit| state.connects >= limit) {
            return Err(TransportError::OpenFailed {
                channel: port_name.to_string(),
                diagnostic: "scripted open failure".to_string(),
            });
        }
        state.connects += 1;
        state.open_now += 1;
        state.max_open = state.max_open.max(state.open_now);
        Ok(Box::new(ScriptedConnection {
            state: self.state.clone(),
        }))
    }
}

struct ScriptedConnection {
    state: Arc<Mutex<ScriptState>>,
}

impl PortConnection for ScriptedConnection {
    fn send(&mut self, data: &[u8]) -> Result<(), String> {
        let mut state = self.state.lock();
        state.attempts += 1;
        if state.next_send_fails() {
            return Err("scripted send failure".to_string());
        }
        state.sent.push(data.to_vec());
        Ok(())
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.state.lock().open_now -= 1;
    }
}

#[derive(Debug, Default)]
struct FlakyState {
    fail_next: usize,
    save_delay: Option<Duration>,
    cancel_on_save: Option<CancellationToken>,
}

/// Memory store with injectable save failures and latency
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    state: Mutex<FlakyState>,
    saves: AtomicUsize,
}

impl FlakyStore {
    pub fn inner(&self) -> Arc<MemoryStore> {
        self.inner.clone()
    }

    pub fn fail_next_saves(&self, n: usize) {
        self.state.lock().fail_next = n;
    }

    pub fn set_save_delay(&self, delay: Duration) {
        self.state.lock().save_delay = Some(delay);
    }

    /// Cancel `token` once the next save has gone through
    pub fn cancel_after_next_save(&self, token: CancellationToken) {
        self.state.lock().cancel_on_save = Some(token);
    }

    /// Save calls seen so far, failed ones included
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn load(&self, ctx: &RequestContext, request: &StoreRequest) -> Result<Option<Value>, StoreError> {
        self.inner.load(ctx, request).await
    }

    async fn save(&self, ctx: &RequestContext, request: &StoreRequest) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.lock().save_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fail = {
            let mut state = self.state.lock();
            if state.fail_next > 0 {
                state.fail_next -= 1;
                true
            } else {
                false
            }
        };
        if fail {
            return Err(StoreError::Rejected {
                route: request.route.clone(),
                message: "injected save failure".to_string(),
            });
        }
        self.inner.save(ctx, request).await?;
        if let Some(token) = self.state.lock().cancel_on_save.take() {
            token.cancel();
        }
        Ok(())
    }
}

/// Controller wired to a scripted backend and a flaky store seeded with the fixtures
pub struct Harness {
    pub ctx: RequestContext,
    pub backend: ScriptedBackend,
    pub store: Arc<FlakyStore>,
    pub repo: Repository,
    seed: Repository,
    pub channels: ChannelRegistry,
    pub policy: RetryPolicy,
    pub controller: MidiFxController,
}

impl Harness {
    pub async fn new() -> Self {
        let ctx = RequestContext::with_correlation_id("test");
        let backend = ScriptedBackend::new(&["Ventris Dual Reverb", "Timeline"]);
        let store = Arc::new(FlakyStore::default());
        let repo = Repository::new(store.clone());
        let seed = Repository::new(store.inner());
        let policy = RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(1),
        };

        seed.save_device(&ctx, &ventris_device()).await.unwrap();
        seed.save_device(&ctx, &pedal_device()).await.unwrap();
        seed.save_selector(&ctx, &reverb_engine_selector()).await.unwrap();
        seed.save_effect_entry(&ctx, &room_catalog_entry()).await.unwrap();
        seed.save_effect_entry(&ctx, &hall_catalog_entry()).await.unwrap();

        let controller = MidiFxController::new(
            repo.clone(),
            ActivatorRegistry::default(),
            ChannelRegistry::new(backend.shared(), 1),
            policy,
        );

        Self {
            ctx,
            channels: ChannelRegistry::new(backend.shared(), 1),
            backend,
            store,
            repo,
            seed,
            policy,
            controller,
        }
    }

    /// Overwrite a stored device without going through the flaky wrapper
    pub async fn seed_device(&self, device: &Device) {
        self.seed.save_device(&self.ctx, device).await.unwrap();
    }

    pub async fn stored_device(&self) -> Device {
        self.seed.load_device(&self.ctx, "VentrisDualReverb").await.unwrap()
    }
}

fn binding(effect: &str, address: i32) -> AddressBinding {
    AddressBinding {
        effect_name: effect.to_string(),
        address,
    }
}

fn mapping(name: &str, bindings: Vec<AddressBinding>) -> ImplementationMapping {
    ImplementationMapping {
        name: name.to_string(),
        bindings,
        default_value: None,
        maximum_value: None,
        selector: None,
    }
}

fn setting(name: &str, value: i32) -> Setting {
    Setting {
        name: name.to_string(),
        value,
        default_value: value,
        dependency_name: None,
        resets: Vec::new(),
    }
}

fn engine(name: &str, active: bool) -> Effect {
    Effect {
        name: name.to_string(),
        active,
        default_active: active,
        settings: vec![
            Setting {
                resets: vec!["Control1".to_string()],
                ..setting("ReverbEngine", 10)
            },
            Setting {
                dependency_name: Some("ReverbEngine".to_string()),
                ..setting("Control1", 0)
            },
            setting("Mix", 64),
        ],
    }
}

/// Dual reverb at its defaults: engine A on, engine B off.
///
/// Every engine carries `ReverbEngine` (mode, resets `Control1`), `Control1`
/// (depends on the mode) and `Mix`.
pub fn ventris_device() -> Device {
    Device {
        name: "VentrisDualReverb".to_string(),
        description: Some("Dual-engine reverb".to_string()),
        connect_name: "Ventris".to_string(),
        implementation_mappings: vec![
            ImplementationMapping {
                selector: Some("ReverbEngine".to_string()),
                ..mapping("ReverbEngine", vec![binding("ReverbEngineA", 40), binding("ReverbEngineB", 41)])
            },
            mapping("Control1", vec![binding("ReverbEngineA", 20), binding("ReverbEngineB", 21)]),
            mapping("EngineParameter1", vec![binding("ReverbEngineA", 15)]),
            mapping("Mix", vec![binding("ReverbEngineA", 30), binding("ReverbEngineB", 31)]),
        ],
        effects: vec![engine("ReverbEngineA", true), engine("ReverbEngineB", false)],
    }
}

/// Single-effect pedal using the toggle fallback
pub fn pedal_device() -> Device {
    Device {
        name: "Timeline".to_string(),
        description: None,
        connect_name: "Timeline".to_string(),
        implementation_mappings: vec![mapping("Active", vec![binding("Delay", 102)])],
        effects: vec![Effect {
            name: "Delay".to_string(),
            active: true,
            default_active: true,
            settings: Vec::new(),
        }],
    }
}

pub fn reverb_engine_selector() -> Selector {
    Selector {
        name: "ReverbEngine".to_string(),
        selections: vec![
            Selection {
                name: "Room".to_string(),
                control_change_message_value: 10,
                control_change_message_maximum_value: None,
            },
            Selection {
                name: "Hall".to_string(),
                control_change_message_value: 20,
                control_change_message_maximum_value: Some(29),
            },
        ],
    }
}

pub fn room_catalog_entry() -> EffectCatalogEntry {
    EffectCatalogEntry {
        name: "Room".to_string(),
        description: Some("Small room".to_string()),
        bindings: vec![DeviceSettingBinding {
            setting_name: "Control1".to_string(),
            device_name: "VentrisDualReverb".to_string(),
            effect_name: "ReverbEngineA".to_string(),
            implementation_mapping_name: "EngineParameter1".to_string(),
        }],
    }
}

/// Mode with no bindings for the reverb
pub fn hall_catalog_entry() -> EffectCatalogEntry {
    EffectCatalogEntry {
        name: "Hall".to_string(),
        description: None,
        bindings: Vec::new(),
    }
}
