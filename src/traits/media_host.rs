use async_trait::async_trait;

use crate::error::BoxError;

/// External image host: takes raw bytes, returns a public URL.
#[async_trait]
pub trait MediaHost: Send + Sync {
    fn name(&self) -> &str;
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, BoxError>;
}
