use async_trait::async_trait;
use bon::Builder;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::BoxError;
use crate::models::config::ImgurConfig;
use crate::publishers::utils::{http_client, preview};
use crate::traits::media_host::MediaHost;

/// Primary image host: anonymous Imgur upload (`POST /3/image`).
#[derive(Builder)]
pub struct ImgurHost {
    client: Client,
    #[builder(into)]
    base_url: String,
    #[builder(into)]
    client_id: String,
}

impl ImgurHost {
    pub fn from_config(cfg: &ImgurConfig) -> Result<Self, BoxError> {
        Ok(Self::builder()
            .client(http_client(cfg.timeout_secs())?)
            .base_url(cfg.api_base_url())
            .client_id(cfg.client_id.clone())
            .build())
    }
}

#[derive(Debug, Deserialize)]
struct ImgurResponse {
    success: Option<bool>,
    data: Option<ImgurImage>,
}

#[derive(Debug, Deserialize)]
struct ImgurImage {
    link: Option<String>,
}

#[async_trait]
impl MediaHost for ImgurHost {
    fn name(&self) -> &str {
        "imgur"
    }

    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, BoxError> {
        let url = format!("{}/3/image", self.base_url.trim_end_matches('/'));
        info!(url = %url, file = file_name, size = bytes.len(), "imgur: upload");
        let form = Form::new()
            .part("image", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("type", "file")
            .text("name", file_name.to_string());
        let res = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Client-ID {}", self.client_id))
            .multipart(form)
            .send()
            .await?;
        let code = res.status();
        let body = res.text().await.unwrap_or_default();
        if !code.is_success() {
            warn!(status = %code, body = %preview(&body), "imgur: upload rejected");
            return Err(format!("imgur: HTTP {}", code).into());
        }
        let parsed: ImgurResponse =
            serde_json::from_str(&body).map_err(|e| format!("imgur: malformed response: {}", e))?;
        if parsed.success == Some(false) {
            return Err(format!("imgur: upload not successful: {}", preview(&body)).into());
        }
        parsed
            .data
            .and_then(|d| d.link)
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| "imgur: response has no link".into())
    }
}
