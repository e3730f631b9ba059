use serde::Deserialize;

use crate::models::credentials::{
    CredentialSet, FacebookCredentials, InstagramCredentials, PlatformCredentials, TelegramCredentials,
    VkCredentials,
};
use crate::models::platform::Platform;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    pub log: Option<LogConfig>,
    pub directus: Option<DirectusConfig>,
    pub media: Option<MediaConfig>,
    pub platforms: Option<PlatformsConfig>,
    pub credentials: Option<CredentialsConfig>,
    pub publish: Option<PublishConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    pub level: Option<String>, // trace | debug | info | warn | error
    pub dir: Option<String>,   // daily rolling file when set
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectusConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    pub collection: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<usize>,
}

impl DirectusConfig {
    pub fn collection(&self) -> &str {
        self.collection.as_deref().unwrap_or("campaign_content")
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(10)
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries.unwrap_or(3)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MediaConfig {
    pub media_root: Option<String>, // base directory for local image paths
    pub download_timeout_secs: Option<u64>,
    pub imgur: Option<ImgurConfig>,
    pub object_storage: Option<ObjectStorageConfig>,
}

impl MediaConfig {
    pub fn download_timeout_secs(&self) -> u64 {
        self.download_timeout_secs.unwrap_or(15)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImgurConfig {
    pub api_base_url: Option<String>,
    pub client_id: String,
    pub timeout_secs: Option<u64>,
}

impl ImgurConfig {
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or("https://api.imgur.com")
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(30)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub public_base_url: Option<String>, // defaults to {endpoint}/{bucket}
    pub prefix: Option<String>,
}

impl ObjectStorageConfig {
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or("us-east-1")
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("crosspost")
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PlatformsConfig {
    pub telegram: Option<TelegramApiConfig>,
    pub vk: Option<VkApiConfig>,
    pub facebook: Option<GraphApiConfig>,
    pub instagram: Option<GraphApiConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramApiConfig {
    pub api_base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl TelegramApiConfig {
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or("https://api.telegram.org")
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(30)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct VkApiConfig {
    pub api_base_url: Option<String>,
    pub api_version: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl VkApiConfig {
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or("https://api.vk.com/method")
    }

    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or("5.131")
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(30)
    }
}

/// Shared by Facebook and Instagram.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GraphApiConfig {
    pub graph_base_url: Option<String>,
    pub api_version: Option<String>,
    pub timeout_secs: Option<u64>,
    pub poll_attempts: Option<usize>,    // Instagram video containers only
    pub poll_interval_secs: Option<u64>,
}

impl GraphApiConfig {
    pub fn graph_base_url(&self) -> &str {
        self.graph_base_url.as_deref().unwrap_or("https://graph.facebook.com")
    }

    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or("v19.0")
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(30)
    }

    pub fn poll_attempts(&self) -> usize {
        self.poll_attempts.unwrap_or(10)
    }

    pub fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs.unwrap_or(5)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CredentialsConfig {
    pub telegram: Option<TelegramCredentials>,
    pub vk: Option<VkCredentials>,
    pub facebook: Option<FacebookCredentials>,
    pub instagram: Option<InstagramCredentials>,
}

impl CredentialsConfig {
    /// Converts the configured blocks into a credential set; validation happens per publish.
    pub fn to_credential_set(&self) -> CredentialSet {
        let mut set = CredentialSet::new();
        if let Some(c) = &self.telegram {
            set.insert(PlatformCredentials::Telegram(c.clone()));
        }
        if let Some(c) = &self.vk {
            set.insert(PlatformCredentials::Vk(c.clone()));
        }
        if let Some(c) = &self.facebook {
            set.insert(PlatformCredentials::Facebook(c.clone()));
        }
        if let Some(c) = &self.instagram {
            set.insert(PlatformCredentials::Instagram(c.clone()));
        }
        set
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PublishConfig {
    #[serde(default)]
    pub default_platforms: Vec<Platform>,
}

impl AppConfig {
    pub fn credential_set(&self) -> CredentialSet {
        self.credentials.as_ref().map(|c| c.to_credential_set()).unwrap_or_default()
    }

    pub fn default_platforms(&self) -> Vec<Platform> {
        self.publish.as_ref().map(|p| p.default_platforms.clone()).unwrap_or_default()
    }

    pub fn platforms(&self) -> PlatformsConfig {
        self.platforms.clone().unwrap_or_default()
    }

    pub fn media(&self) -> MediaConfig {
        self.media.clone().unwrap_or_default()
    }
}
