use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::models::content::ContentItem;
use crate::models::types::ContentId;

/// Хранилище контента (Directus или тестовая подмена)
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn fetch_content(&self, id: &ContentId) -> Result<ContentItem, StoreError>;

    /// Raw publication-status field: an object, a JSON string, or absent.
    async fn fetch_status_map(&self, id: &ContentId) -> Result<Option<Value>, StoreError>;

    async fn write_status_map(&self, id: &ContentId, map: Value) -> Result<(), StoreError>;
}
