use std::path::PathBuf;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use uuid::Uuid;

use super::{extension_for, AvatarStore};

/// Writes avatars into a directory that the router serves statically.
#[derive(Debug, Clone)]
pub struct LocalAvatarStore {
    dir: PathBuf,
    public_path: String,
}

impl LocalAvatarStore {
    pub fn new(dir: impl Into<PathBuf>, public_path: &str) -> Self {
        Self {
            dir: dir.into(),
            public_path: public_path.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    /// File name behind a locator, if the locator points into this store.
    fn file_name<'a>(&self, locator: &'a str) -> Option<&'a str> {
        let name = locator
            .strip_prefix(self.public_path.as_str())?
            .strip_prefix('/')?;
        let safe = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && !name.contains("..");
        safe.then_some(name)
    }
}

#[async_trait]
impl AvatarStore for LocalAvatarStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        let ext = extension_for(content_type)
            .ok_or_else(|| anyhow!("unsupported avatar content type {content_type}"))?;
        let name = format!("{}.{ext}", Uuid::now_v7());

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        // Readers never observe a partially written file.
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let target = self.dir.join(&name);
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .with_context(|| format!("failed to move avatar into {}", target.display()))?;

        Ok(format!("{}/{name}", self.public_path))
    }

    async fn delete(&self, locator: &str) -> anyhow::Result<()> {
        let Some(name) = self.file_name(locator) else {
            tracing::debug!(locator = %locator, "not a local avatar, skipping delete");
            return Ok(());
        };

        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to delete avatar {name}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> LocalAvatarStore {
        let dir = std::env::temp_dir().join(format!("agora-avatars-{}", Uuid::new_v4()));
        LocalAvatarStore::new(dir, "/uploads/")
    }

    #[tokio::test]
    async fn store_then_delete() {
        let store = temp_store();
        let locator = store.store(b"gif-bytes".to_vec(), "image/gif").await.unwrap();
        assert!(locator.starts_with("/uploads/"));
        assert!(locator.ends_with(".gif"));

        let path = store.dir().join(store.file_name(&locator).unwrap());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"gif-bytes");

        store.delete(&locator).await.unwrap();
        assert!(!path.exists());
        // Deleting twice is fine.
        store.delete(&locator).await.unwrap();

        let _ = tokio::fs::remove_dir_all(store.dir()).await;
    }

    #[test]
    fn foreign_or_traversal_locators_are_ignored() {
        let store = temp_store();
        assert!(store.file_name("data:image/png;base64,AAAA").is_none());
        assert!(store.file_name("/uploads/../secret").is_none());
        assert!(store.file_name("/uploads/a/b.png").is_none());
        assert_eq!(store.file_name("/uploads/a.png"), Some("a.png"));
    }
}
