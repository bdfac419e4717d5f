use anyhow::anyhow;
use async_trait::async_trait;
use uuid::Uuid;

use agora_shared::clients::object_store::ObjectStorage;

use super::{extension_for, AvatarStore};

/// Stores avatars in an S3-compatible bucket under `avatars/`.
#[derive(Clone)]
pub struct S3AvatarStore {
    storage: ObjectStorage,
}

impl S3AvatarStore {
    pub fn new(storage: ObjectStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl AvatarStore for S3AvatarStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        let ext = extension_for(content_type)
            .ok_or_else(|| anyhow!("unsupported avatar content type {content_type}"))?;
        let key = format!("avatars/{}.{ext}", Uuid::now_v7());
        self.storage.upload(&key, bytes, content_type).await
    }

    async fn delete(&self, locator: &str) -> anyhow::Result<()> {
        match self.storage.key_from_url(locator) {
            Some(key) => self.storage.delete(key).await,
            None => Ok(()),
        }
    }
}
