use async_trait::async_trait;
use chrono::Utc;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{ObjectStoreExt, PutPayload};
use tracing::{error, info};

use crate::error::BoxError;
use crate::models::config::ObjectStorageConfig;
use crate::traits::media_host::MediaHost;

/// Secondary image host: S3-compatible bucket with public-read objects.
pub struct ObjectStorageHost {
    store: AmazonS3,
    bucket: String,
    public_base_url: String,
    prefix: String,
}

impl ObjectStorageHost {
    pub fn from_config(cfg: &ObjectStorageConfig) -> Result<Self, BoxError> {
        let endpoint = cfg.endpoint.trim_end_matches('/').to_string();
        let store = AmazonS3Builder::new()
            .with_region(cfg.region())
            .with_bucket_name(cfg.bucket.clone())
            .with_endpoint(endpoint.clone())
            .with_allow_http(endpoint.starts_with("http://"))
            .with_access_key_id(cfg.access_key_id.clone())
            .with_secret_access_key(cfg.secret_access_key.clone())
            .build()?;

        let public_base_url = cfg
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("{}/{}", endpoint, cfg.bucket));

        Ok(Self {
            store,
            bucket: cfg.bucket.clone(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            prefix: cfg.prefix().trim_matches('/').to_string(),
        })
    }

    fn object_key(&self, file_name: &str) -> String {
        object_key(&self.prefix, Utc::now().timestamp_millis(), file_name)
    }
}

fn object_key(prefix: &str, stamp: i64, file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if prefix.is_empty() {
        format!("{stamp}-{safe}")
    } else {
        format!("{prefix}/{stamp}-{safe}")
    }
}

#[async_trait]
impl MediaHost for ObjectStorageHost {
    fn name(&self) -> &str {
        "object_storage"
    }

    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, BoxError> {
        let key = self.object_key(file_name);
        let size = bytes.len();
        self.store
            .put(&Path::from(key.clone()), PutPayload::from(bytes))
            .await
            .map_err(|e| {
                error!(error = %e, bucket = %self.bucket, key = %key, size_bytes = size, "object storage: upload failed");
                e
            })?;
        let url = format!("{}/{}", self.public_base_url, key);
        info!(bucket = %self.bucket, key = %key, size_bytes = size, url = %url, "object storage: uploaded");
        Ok(url)
    }
}
