use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::models::StorageId;

/// One-time destination for a single blob upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadTarget {
    pub token: Uuid,
}

/// Blob storage behind study-material uploads.
///
/// Uploading is a handshake: obtain a target, send bytes to it once, keep
/// the returned storage id alongside the material metadata.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn generate_upload_target(&self) -> PortalResult<UploadTarget>;
    async fn upload(&self, target: UploadTarget, bytes: &[u8]) -> PortalResult<StorageId>;
    async fn url(&self, id: StorageId) -> PortalResult<Option<String>>;
}

pub struct LocalFileStorage {
    root: PathBuf,
    pending: Mutex<HashSet<Uuid>>,
}

impl LocalFileStorage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            pending: Mutex::new(HashSet::new()),
        }
    }

    fn blob_path(&self, id: StorageId) -> PathBuf {
        self.root.join(id.to_string())
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn generate_upload_target(&self) -> PortalResult<UploadTarget> {
        let token = Uuid::new_v4();
        self.pending.lock().await.insert(token);
        Ok(UploadTarget { token })
    }

    async fn upload(&self, target: UploadTarget, bytes: &[u8]) -> PortalResult<StorageId> {
        if !self.pending.lock().await.remove(&target.token) {
            return Err(PortalError::UploadTarget);
        }

        let id = Uuid::new_v4();
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.blob_path(id), bytes).await?;
        debug!(storage_id = %id, size = bytes.len(), "stored upload");
        Ok(id)
    }

    async fn url(&self, id: StorageId) -> PortalResult<Option<String>> {
        let path = self.blob_path(id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let absolute = tokio::fs::canonicalize(&path).await?;
        Ok(Some(format!("file://{}", absolute.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_storage() -> LocalFileStorage {
        LocalFileStorage::new(std::env::temp_dir().join(format!("portal-files-{}", Uuid::new_v4())))
    }

    #[tokio::test]
    async fn upload_target_is_single_use() {
        let storage = scratch_storage();
        let target = storage.generate_upload_target().await.unwrap();

        let id = storage.upload(target, b"module 1 notes").await.unwrap();
        let url = storage.url(id).await.unwrap().unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(&id.to_string()));

        assert!(matches!(
            storage.upload(target, b"again").await,
            Err(PortalError::UploadTarget)
        ));
    }

    #[tokio::test]
    async fn unknown_target_is_rejected() {
        let storage = scratch_storage();
        let stray = UploadTarget {
            token: Uuid::new_v4(),
        };
        assert!(storage.upload(stray, b"bytes").await.is_err());
    }

    #[tokio::test]
    async fn missing_blob_has_no_url() {
        let storage = scratch_storage();
        assert_eq!(storage.url(Uuid::new_v4()).await.unwrap(), None);
    }
}
