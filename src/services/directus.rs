use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use bon::bon;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::{BoxError, StoreError};
use crate::models::config::DirectusConfig;
use crate::models::content::ContentItem;
use crate::models::types::{ContentId, ImageRef};
use crate::publishers::utils::{http_client, preview};
use crate::traits::content_store::ContentStore;

const STATUS_FIELD: &str = "social_platforms";

/// Directus-backed content store (`/items/{collection}/{id}`).
pub struct DirectusStore {
    client: Client,
    base_url: String,
    token: String,
    collection: String,
    max_retries: usize,
    min_delay: Duration,
}

/// One failed request; 5xx and transport errors may be retried.
#[derive(Debug)]
struct Failure {
    message: String,
    retryable: bool,
}

#[bon]
impl DirectusStore {
    #[builder]
    pub fn new(
        client: Option<Client>,
        #[builder(into)] base_url: String,
        #[builder(into)] token: String,
        #[builder(into, default = "campaign_content".to_string())] collection: String,
        #[builder(default = 3)] max_retries: usize,
        #[builder(default = Duration::from_millis(500))] min_delay: Duration,
    ) -> Self {
        Self {
            client: client.unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            collection,
            max_retries,
            min_delay,
        }
    }
}

impl DirectusStore {
    pub fn from_config(cfg: &DirectusConfig) -> Result<Self, BoxError> {
        Ok(Self::builder()
            .client(http_client(cfg.timeout_secs())?)
            .base_url(cfg.base_url.clone())
            .token(cfg.token.clone())
            .collection(cfg.collection())
            .max_retries(cfg.max_retries())
            .build())
    }

    fn item_url(&self, id: &ContentId) -> String {
        format!("{}/items/{}/{}", self.base_url, self.collection, id)
    }

    async fn send_once(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value, Failure> {
        let mut req = self.client.request(method, url).bearer_auth(&self.token);
        if let Some(body) = body {
            req = req.json(body);
        }
        let res = req.send().await.map_err(|e| Failure { message: e.to_string(), retryable: true })?;
        let code = res.status();
        let text = res.text().await.unwrap_or_default();
        if !code.is_success() {
            return Err(Failure {
                message: format!("HTTP {}: {}", code, preview(&text)),
                retryable: code.is_server_error() || code == StatusCode::TOO_MANY_REQUESTS,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| Failure { message: format!("malformed response: {}", e), retryable: false })
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value, StoreError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_times(self.max_retries);
        let attempt = || {
            let method = method.clone();
            async move { self.send_once(method, url, body).await }
        };
        attempt
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(|f: &Failure| f.retryable)
            .notify(|f: &Failure, dur: Duration| {
                warn!(url = %url, error = %f.message, retry_in = ?dur, "directus: retrying request");
            })
            .await
            .map_err(|f| StoreError::new(f.message))
    }

    async fn fetch_record(&self, id: &ContentId) -> Result<Value, StoreError> {
        let body = self.send(Method::GET, &self.item_url(id), None).await?;
        match body.get("data") {
            Some(Value::Object(_)) => Ok(body["data"].clone()),
            _ => Err(StoreError::new(format!("item {} not found", id))),
        }
    }
}

#[async_trait::async_trait]
impl ContentStore for DirectusStore {
    async fn fetch_content(&self, id: &ContentId) -> Result<ContentItem, StoreError> {
        let record = self.fetch_record(id).await?;
        let item = content_from_record(id, &record);
        info!(
            content_id = %id,
            images = item.all_images().len(),
            hashtags = item.hashtags.len(),
            "directus: content loaded"
        );
        Ok(item)
    }

    async fn fetch_status_map(&self, id: &ContentId) -> Result<Option<Value>, StoreError> {
        let url = format!("{}?fields={}", self.item_url(id), STATUS_FIELD);
        let body = self.send(Method::GET, &url, None).await?;
        Ok(body
            .get("data")
            .and_then(|d| d.get(STATUS_FIELD))
            .filter(|v| !v.is_null())
            .cloned())
    }

    async fn write_status_map(&self, id: &ContentId, map: Value) -> Result<(), StoreError> {
        let body = json!({ STATUS_FIELD: map });
        self.send(Method::PATCH, &self.item_url(id), Some(&body)).await?;
        Ok(())
    }
}

/// Maps a Directus record onto a content item; tolerant of string-encoded arrays.
pub fn content_from_record(id: &ContentId, record: &Value) -> ContentItem {
    let text = |key: &str| record.get(key).and_then(Value::as_str).map(str::to_string).filter(|s| !s.trim().is_empty());
    ContentItem::builder()
        .id(id.clone())
        .maybe_title(text("title"))
        .body(text("content").unwrap_or_default())
        .maybe_image(text("image_url").map(ImageRef::from))
        .additional_images(string_list(record.get("additional_images")).into_iter().map(ImageRef::from).collect())
        .maybe_video(text("video_url"))
        .hashtags(string_list(record.get("hashtags")))
        .build()
}

/// Accepts an array, a JSON-encoded array or a comma-separated string.
/// Array items may be strings or objects with `url`/`tag`.
fn string_list(value: Option<&Value>) -> Vec<String> {
    let items = match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => items,
            _ => raw.split(',').map(|s| Value::String(s.to_string())).collect(),
        },
        _ => Vec::new(),
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(obj) => ["url", "tag", "name"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}
