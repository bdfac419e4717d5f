use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::AvatarStore;

/// Embeds the image in the locator itself as a `data:` URI.
#[derive(Debug, Default, Clone)]
pub struct InlineAvatarStore;

#[async_trait]
impl AvatarStore for InlineAvatarStore {
    fn backend(&self) -> &'static str {
        "inline"
    }

    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        Ok(format!("data:{content_type};base64,{}", STANDARD.encode(bytes)))
    }

    async fn delete(&self, _locator: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
