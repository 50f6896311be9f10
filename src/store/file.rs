//! JSON document store on the local filesystem
//!
//! One pretty-printed JSON file per route (`devices/Ventris` ->
//! `<dir>/devices/Ventris.json`). Writes go to a temp file first and are
//! renamed into place, so a reader never sees a half-written document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use super::{DocumentStore, StoreError, StoreRequest};
use crate::context::RequestContext;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, route: &str) -> Result<PathBuf, StoreError> {
        let rejected = |message: &str| StoreError::Rejected {
            route: route.to_string(),
            message: message.to_string(),
        };

        let segments: Vec<&str> = route.split('/').collect();
        let mut path = self.dir.clone();
        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() || *segment == "." || *segment == ".." {
                return Err(rejected("invalid route segment"));
            }
            if segment.contains(['\\', ':']) {
                return Err(rejected("route contains a path separator"));
            }
            if i + 1 == segments.len() {
                path.push(format!("{}.json", segment));
            } else {
                path.push(segment);
            }
        }
        Ok(path)
    }
}

fn io_error(route: &str, e: std::io::Error) -> StoreError {
    StoreError::Io {
        route: route.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn load(&self, ctx: &RequestContext, request: &StoreRequest) -> Result<Option<Value>, StoreError> {
        if ctx.is_cancelled() {
            return Err(StoreError::Cancelled(request.route.clone()));
        }
        let path = self.path_for(&request.route)?;

        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&request.route, e)),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StoreError::Malformed {
                route: request.route.clone(),
                message: e.to_string(),
            })
    }

    async fn save(&self, ctx: &RequestContext, request: &StoreRequest) -> Result<(), StoreError> {
        if ctx.is_cancelled() {
            return Err(StoreError::Cancelled(request.route.clone()));
        }
        let path = self.path_for(&request.route)?;
        let body = request.body.as_ref().ok_or_else(|| StoreError::Rejected {
            route: request.route.clone(),
            message: "save without a body".to_string(),
        })?;

        let json = serde_json::to_string_pretty(body).map_err(|e| StoreError::Malformed {
            route: request.route.clone(),
            message: e.to_string(),
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(&request.route, e))?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .map_err(|e| io_error(&request.route, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&request.route, e))?;

        debug!(route = %request.route, path = %path.display(), "Document saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Repository;
    use crate::testing;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load_device() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::new(Arc::new(FileStore::new(dir.path())));
        let ctx = RequestContext::new();
        let device = testing::ventris_device();

        repo.save_device(&ctx, &device).await.unwrap();

        assert!(dir.path().join("devices").join("VentrisDualReverb.json").exists());
        assert!(!dir.path().join("devices").join("VentrisDualReverb.json.tmp").exists());
        assert_eq!(repo.load_device(&ctx, "VentrisDualReverb").await.unwrap(), device);
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let loaded = store
            .load(&RequestContext::new(), &StoreRequest::get("selectors/ReverbEngine"))
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_route_cannot_escape_directory() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let ctx = RequestContext::new();

        for route in ["../secrets", "devices//x", "devices/a\\b", ""] {
            let err = store.load(&ctx, &StoreRequest::get(route)).await.unwrap_err();
            assert!(matches!(err, StoreError::Rejected { .. }), "route {route:?}");
        }
    }

    #[tokio::test]
    async fn test_corrupt_file_is_malformed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("effects")).unwrap();
        std::fs::write(dir.path().join("effects").join("Room.json"), "{ not json").unwrap();

        let err = FileStore::new(dir.path())
            .load(&RequestContext::new(), &StoreRequest::get("effects/Room"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }
}
