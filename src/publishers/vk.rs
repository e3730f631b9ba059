use async_trait::async_trait;
use bon::Builder;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::BoxError;
use crate::models::config::VkApiConfig;
use crate::models::credentials::PlatformCredentials;
use crate::models::platform::{Platform, PublicationShape};
use crate::models::publication::PublishedPost;
use crate::publishers::utils::{http_client, preview, truncate_with_ellipsis};
use crate::services::text_adapter::VK_TEXT_LIMIT;
use crate::traits::publisher::{PlatformPublisher, PublishRequest, mismatch};

/// Max photo attachments on one wall post.
pub const MAX_ATTACHMENTS: usize = 10;

/// VK community wall publisher.
#[derive(Builder)]
pub struct VkPublisher {
    client: Client,
    #[builder(into)]
    base_url: String,
    #[builder(into, default = "5.131".to_string())]
    api_version: String,
}

impl VkPublisher {
    pub fn from_config(cfg: &VkApiConfig) -> Result<Self, BoxError> {
        Ok(Self::builder()
            .client(http_client(cfg.timeout_secs())?)
            .base_url(cfg.api_base_url().trim_end_matches('/'))
            .api_version(cfg.api_version())
            .build())
    }

    async fn method(&self, name: &str, token: &str, mut params: Vec<(&str, String)>) -> Result<Value, BoxError> {
        let url = format!("{}/{}", self.base_url, name);
        params.push(("access_token", token.to_string()));
        params.push(("v", self.api_version.clone()));
        let res = self.client.post(&url).form(&params).send().await?;
        let code = res.status();
        let text = res.text().await.unwrap_or_default();
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        if let Some(err) = body.get("error") {
            let err_code = err.get("error_code").map(|c| c.to_string()).unwrap_or_default();
            let msg = err.get("error_msg").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(format!("vk {}: {}: {}", name, err_code, msg).into());
        }
        if !code.is_success() {
            return Err(format!("vk {}: HTTP {}: {}", name, code, preview(&text)).into());
        }
        body.get("response")
            .cloned()
            .ok_or_else(|| format!("vk {}: malformed response: {}", name, preview(&text)).into())
    }

    /// upload server, download, multipart upload, save. Returns `photo{owner}_{id}`.
    async fn upload_photo(&self, token: &str, group_id: &str, image_url: &str) -> Result<String, BoxError> {
        let server = self
            .method("photos.getWallUploadServer", token, vec![("group_id", group_id.to_string())])
            .await?;
        let upload_url = server
            .get("upload_url")
            .and_then(Value::as_str)
            .ok_or("vk: no upload_url")?
            .to_string();

        let image = self.client.get(image_url).send().await?.error_for_status()?.bytes().await?;
        let form = Form::new().part("photo", Part::bytes(image.to_vec()).file_name("image.jpg"));
        let uploaded: Value = self.client.post(&upload_url).multipart(form).send().await?.json().await?;
        let photo = uploaded
            .get("photo")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty() && *p != "[]")
            .ok_or("vk: upload server returned no photo")?;
        let server_id = uploaded.get("server").map(scalar).unwrap_or_default();
        let hash = uploaded.get("hash").map(scalar).unwrap_or_default();

        let saved = self
            .method(
                "photos.saveWallPhoto",
                token,
                vec![
                    ("group_id", group_id.to_string()),
                    ("photo", photo.to_string()),
                    ("server", server_id),
                    ("hash", hash),
                ],
            )
            .await?;
        let first = saved.get(0).ok_or("vk: saveWallPhoto returned nothing")?;
        let owner = first.get("owner_id").map(scalar).unwrap_or_default();
        let id = first.get("id").map(scalar).unwrap_or_default();
        if owner.is_empty() || id.is_empty() {
            return Err("vk: saved photo has no owner_id/id".into());
        }
        Ok(format!("photo{}_{}", owner, id))
    }
}

fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `-123`, `club123`, `public123` all become `123`.
pub fn normalize_group_id(raw: &str) -> String {
    let id = raw.trim().trim_start_matches('-');
    id.strip_prefix("club")
        .or_else(|| id.strip_prefix("public"))
        .unwrap_or(id)
        .to_string()
}

/// Title on its own paragraph above the adapted text.
pub fn wall_text(title: &str, text: &str) -> String {
    let title = title.trim();
    let full = match (title.is_empty(), text.trim().is_empty()) {
        (true, _) => text.to_string(),
        (false, true) => title.to_string(),
        (false, false) if text.starts_with(title) => text.to_string(),
        (false, false) => format!("{}\n\n{}", title, text),
    };
    truncate_with_ellipsis(&full, VK_TEXT_LIMIT)
}

#[async_trait]
impl PlatformPublisher for VkPublisher {
    fn platform(&self) -> Platform {
        Platform::Vk
    }

    async fn publish(&self, req: &PublishRequest<'_>) -> Result<PublishedPost, BoxError> {
        let PlatformCredentials::Vk(creds) = req.credentials else {
            return Err(mismatch(Platform::Vk, req.credentials));
        };
        let token = creds.access_token.trim();
        let group_id = normalize_group_id(&creds.group_id);

        let mut attachments = Vec::new();
        for url in req.images.iter().take(MAX_ATTACHMENTS) {
            match self.upload_photo(token, &group_id, url).await {
                Ok(attachment) => {
                    info!(group_id = %group_id, attachment = %attachment, "vk: photo attached");
                    attachments.push(attachment);
                }
                Err(e) => warn!(group_id = %group_id, image = %url, error = %e, "vk: photo skipped"),
            }
        }

        let message = wall_text(req.title(), &req.text.text);
        if message.is_empty() && attachments.is_empty() {
            return Err("vk: nothing to post".into());
        }
        let mut params = vec![
            ("owner_id", format!("-{}", group_id)),
            ("from_group", "1".to_string()),
            ("message", message),
        ];
        if !attachments.is_empty() {
            params.push(("attachments", attachments.join(",")));
        }
        let response = self.method("wall.post", token, params).await?;
        let post_id = response.get("post_id").map(scalar).filter(|s| !s.is_empty()).ok_or("vk: wall.post returned no post_id")?;
        let url = format!("https://vk.com/wall-{}_{}", group_id, post_id);
        info!(group_id = %group_id, post_id = %post_id, attachments = attachments.len(), "vk: posted");
        Ok(PublishedPost::new(PublicationShape::WallPost, url, Some(post_id)))
    }
}
