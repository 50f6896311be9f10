//! Document store seam
//!
//! The gateway only ever loads and saves whole JSON documents keyed by route
//! (`devices/{name}`, `selectors/{name}`, `effects/{name}`). [`Repository`]
//! layers the typed model on top of any [`DocumentStore`].

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{ControlError, NotFound};
use crate::model::{Device, EffectCatalogEntry, Selector};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("I/O error on '{route}': {message}")]
    Io { route: String, message: String },

    #[error("document '{route}' is malformed: {message}")]
    Malformed { route: String, message: String },

    #[error("store request '{0}' cancelled")]
    Cancelled(String),

    #[error("store rejected '{route}': {message}")]
    Rejected { route: String, message: String },
}

/// A single store call: the route plus, for writes, the document body
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRequest {
    pub route: String,
    pub body: Option<Value>,
}

impl StoreRequest {
    pub fn get(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            body: None,
        }
    }

    pub fn put(route: impl Into<String>, body: Value) -> Self {
        Self {
            route: route.into(),
            body: Some(body),
        }
    }

    pub fn device(name: &str) -> String {
        format!("devices/{}", name)
    }

    pub fn selector(name: &str) -> String {
        format!("selectors/{}", name)
    }

    pub fn effect(name: &str) -> String {
        format!("effects/{}", name)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when no document exists at the route
    async fn load(&self, ctx: &RequestContext, request: &StoreRequest) -> Result<Option<Value>, StoreError>;

    /// Replace the whole document at the route with the request body
    async fn save(&self, ctx: &RequestContext, request: &StoreRequest) -> Result<(), StoreError>;
}

/// Typed access to devices and catalogs
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn load_device(&self, ctx: &RequestContext, name: &str) -> Result<Device, ControlError> {
        self.load(ctx, StoreRequest::device(name))
            .await?
            .ok_or_else(|| NotFound::Device(name.to_string()).into())
    }

    pub async fn save_device(&self, ctx: &RequestContext, device: &Device) -> Result<(), StoreError> {
        self.save(ctx, StoreRequest::device(&device.name), device).await
    }

    pub async fn load_selector(&self, ctx: &RequestContext, name: &str) -> Result<Selector, ControlError> {
        self.load(ctx, StoreRequest::selector(name))
            .await?
            .ok_or_else(|| NotFound::Selector(name.to_string()).into())
    }

    pub async fn save_selector(&self, ctx: &RequestContext, selector: &Selector) -> Result<(), StoreError> {
        self.save(ctx, StoreRequest::selector(&selector.name), selector).await
    }

    pub async fn load_effect_entry(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<EffectCatalogEntry, ControlError> {
        self.load(ctx, StoreRequest::effect(name))
            .await?
            .ok_or_else(|| NotFound::CatalogEntry(name.to_string()).into())
    }

    pub async fn save_effect_entry(
        &self,
        ctx: &RequestContext,
        entry: &EffectCatalogEntry,
    ) -> Result<(), StoreError> {
        self.save(ctx, StoreRequest::effect(&entry.name), entry).await
    }

    async fn load<T: DeserializeOwned>(&self, ctx: &RequestContext, route: String) -> Result<Option<T>, StoreError> {
        let request = StoreRequest::get(route);
        let Some(value) = self.store.load(ctx, &request).await? else {
            debug!(route = %request.route, "Document not found");
            return Ok(None);
        };

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Malformed {
                route: request.route,
                message: e.to_string(),
            })
    }

    async fn save<T: Serialize>(&self, ctx: &RequestContext, route: String, document: &T) -> Result<(), StoreError> {
        let body = serde_json::to_value(document).map_err(|e| StoreError::Malformed {
            route: route.clone(),
            message: e.to_string(),
        })?;
        self.store.save(ctx, &StoreRequest::put(route, body)).await
    }
}
