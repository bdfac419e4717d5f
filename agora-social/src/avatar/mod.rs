//! Avatar storage strategies and the default-avatar generator.

use async_trait::async_trait;

use agora_shared::errors::{AppError, AppResult, ErrorCode};

pub mod identicon;
mod inline;
mod local;
mod s3;

pub use inline::InlineAvatarStore;
pub use local::LocalAvatarStore;
pub use s3::S3AvatarStore;

/// Content types accepted from clients.
pub const ACCEPTED_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif"];

/// Stores avatar images and hands back a locator that can be used as the
/// user's `avatarUrl`. Writes always go to a fresh locator.
#[async_trait]
pub trait AvatarStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String>;

    /// Removes a locator previously returned by [`AvatarStore::store`].
    /// Locators this store did not produce are ignored.
    async fn delete(&self, locator: &str) -> anyhow::Result<()>;
}

/// File extension for a content type this service may store.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        identicon::CONTENT_TYPE => Some("svg"),
        _ => None,
    }
}

/// An uploaded avatar that passed type and size checks.
#[derive(Debug)]
pub struct AvatarUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl AvatarUpload {
    pub fn new(bytes: Vec<u8>, content_type: &str, max_bytes: usize) -> AppResult<Self> {
        let content_type = content_type.to_ascii_lowercase();
        if !ACCEPTED_TYPES.contains(&content_type.as_str()) {
            return Err(AppError::new(
                ErrorCode::InvalidAvatar,
                "unsupported image format, accepted: jpeg, png, gif",
            ));
        }
        if bytes.is_empty() {
            return Err(AppError::new(ErrorCode::InvalidAvatar, "avatar file is empty"));
        }
        if bytes.len() > max_bytes {
            return Err(AppError::with_details(
                ErrorCode::InvalidAvatar,
                "avatar file is too large",
                serde_json::json!({ "maxBytes": max_bytes, "actualBytes": bytes.len() }),
            ));
        }
        Ok(Self { bytes, content_type })
    }
}
