use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bon::bon;
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use crate::error::{BoxError, MediaError};
use crate::media::{ImgurHost, ObjectStorageHost};
use crate::models::config::MediaConfig;
use crate::models::types::{ImageLocation, ImageRef};
use crate::publishers::utils::http_client;
use crate::traits::media_host::MediaHost;

/// A URL the platform APIs can fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub url: String,
    /// Host that accepted the upload; `None` when the reference was already public.
    pub host: Option<String>,
}

/// Turns image references into public URLs: primary host first, secondary on any failure.
pub struct MediaResolver {
    client: Client,
    media_root: Option<PathBuf>,
    primary: Option<Arc<dyn MediaHost>>,
    secondary: Option<Arc<dyn MediaHost>>,
}

#[bon]
impl MediaResolver {
    #[builder]
    pub fn new(
        client: Option<Client>,
        #[builder(into)] media_root: Option<PathBuf>,
        primary: Option<Arc<dyn MediaHost>>,
        secondary: Option<Arc<dyn MediaHost>>,
    ) -> Self {
        Self { client: client.unwrap_or_default(), media_root, primary, secondary }
    }
}

impl MediaResolver {
    pub fn from_config(cfg: &MediaConfig) -> Result<Self, BoxError> {
        let primary: Option<Arc<dyn MediaHost>> = match &cfg.imgur {
            Some(imgur) => Some(Arc::new(ImgurHost::from_config(imgur)?)),
            None => None,
        };
        let secondary: Option<Arc<dyn MediaHost>> = match &cfg.object_storage {
            Some(storage) => Some(Arc::new(ObjectStorageHost::from_config(storage)?)),
            None => None,
        };
        Ok(Self::builder()
            .client(http_client(cfg.download_timeout_secs())?)
            .maybe_media_root(cfg.media_root.as_ref().map(PathBuf::from))
            .maybe_primary(primary)
            .maybe_secondary(secondary)
            .build())
    }

    pub async fn resolve(&self, image: &ImageRef) -> Result<ResolvedMedia, MediaError> {
        match image.location() {
            ImageLocation::Public(_) => Ok(ResolvedMedia { url: image.as_str().trim().to_string(), host: None }),
            ImageLocation::Internal(url) => {
                let bytes = self.download(image, &url).await?;
                self.rehost(image, bytes).await
            }
            ImageLocation::LocalPath(path) => {
                let bytes = self.read_local(image, &path).await?;
                self.rehost(image, bytes).await
            }
        }
    }

    /// Resolves each distinct reference once, keeping input order.
    /// A reference no host accepted is passed on unchanged.
    pub async fn resolve_or_original(&self, images: &[ImageRef]) -> Vec<String> {
        let mut resolved: HashMap<&str, String> = HashMap::new();
        let mut urls = Vec::with_capacity(images.len());
        for image in images {
            let key = image.as_str().trim();
            if let Some(url) = resolved.get(key) {
                urls.push(url.clone());
                continue;
            }
            let url = match self.resolve(image).await {
                Ok(media) => media.url,
                Err(e) => {
                    warn!(image = %image, error = %e, "media: resolution failed, using original reference");
                    key.to_string()
                }
            };
            resolved.insert(key, url.clone());
            urls.push(url);
        }
        urls
    }

    async fn rehost(&self, image: &ImageRef, bytes: Vec<u8>) -> Result<ResolvedMedia, MediaError> {
        let file_name = image.file_name();
        let mut failures = Vec::new();
        for host in [&self.primary, &self.secondary].into_iter().flatten() {
            match host.upload(&file_name, bytes.clone()).await {
                Ok(url) => {
                    info!(image = %image, host = host.name(), url = %url, "media: uploaded");
                    return Ok(ResolvedMedia { url, host: Some(host.name().to_string()) });
                }
                Err(e) => {
                    warn!(image = %image, host = host.name(), error = %e, "media: upload failed");
                    failures.push(format!("{}: {}", host.name(), e));
                }
            }
        }
        let reason = if failures.is_empty() {
            "no media host configured".to_string()
        } else {
            failures.join("; ")
        };
        Err(MediaError::NoHostSucceeded { reference: image.to_string(), reason })
    }

    async fn download(&self, image: &ImageRef, url: &Url) -> Result<Vec<u8>, MediaError> {
        let read_err = |reason: String| MediaError::Read { reference: image.to_string(), reason };
        let res = self.client.get(url.clone()).send().await.map_err(|e| read_err(e.to_string()))?;
        if !res.status().is_success() {
            return Err(read_err(format!("HTTP {}", res.status())));
        }
        let bytes = res.bytes().await.map_err(|e| read_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn read_local(&self, image: &ImageRef, raw: &str) -> Result<Vec<u8>, MediaError> {
        let path = self.local_path(raw);
        tokio::fs::read(&path).await.map_err(|e| MediaError::Read {
            reference: image.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }

    fn local_path(&self, raw: &str) -> PathBuf {
        match &self.media_root {
            Some(root) => {
                let joined = root.join(raw.trim_start_matches(['/', '\\']));
                if !joined.exists() && Path::new(raw).is_absolute() && Path::new(raw).exists() {
                    PathBuf::from(raw)
                } else {
                    joined
                }
            }
            None => PathBuf::from(raw),
        }
    }
}
