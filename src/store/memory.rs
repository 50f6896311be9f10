use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{DocumentStore, StoreError, StoreRequest};
use crate::context::RequestContext;

/// In-process document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, ctx: &RequestContext, request: &StoreRequest) -> Result<Option<Value>, StoreError> {
        if ctx.is_cancelled() {
            return Err(StoreError::Cancelled(request.route.clone()));
        }
        Ok(self.documents.read().get(&request.route).cloned())
    }

    async fn save(&self, ctx: &RequestContext, request: &StoreRequest) -> Result<(), StoreError> {
        if ctx.is_cancelled() {
            return Err(StoreError::Cancelled(request.route.clone()));
        }
        let body = request.body.clone().ok_or_else(|| StoreError::Rejected {
            route: request.route.clone(),
            message: "save without a body".to_string(),
        })?;
        self.documents.write().insert(request.route.clone(), body);
        Ok(())
    }
}
