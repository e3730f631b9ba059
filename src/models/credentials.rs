use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CredentialError;
use crate::models::platform::Platform;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TelegramCredentials {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VkCredentials {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FacebookCredentials {
    /// User access token; exchanged for a page token before publishing.
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub page_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InstagramCredentials {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub business_account_id: String,
}

/// Per-platform settings, one variant per platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PlatformCredentials {
    Telegram(TelegramCredentials),
    Vk(VkCredentials),
    Instagram(InstagramCredentials),
    Facebook(FacebookCredentials),
}

impl PlatformCredentials {
    pub fn platform(&self) -> Platform {
        match self {
            PlatformCredentials::Telegram(_) => Platform::Telegram,
            PlatformCredentials::Vk(_) => Platform::Vk,
            PlatformCredentials::Instagram(_) => Platform::Instagram,
            PlatformCredentials::Facebook(_) => Platform::Facebook,
        }
    }

    /// Checks every field the platform needs before any network call.
    pub fn validate(&self) -> Result<(), CredentialError> {
        let platform = self.platform();
        let required: [(&'static str, &str); 2] = match self {
            PlatformCredentials::Telegram(c) => [("bot_token", &c.bot_token), ("chat_id", &c.chat_id)],
            PlatformCredentials::Vk(c) => [("access_token", &c.access_token), ("group_id", &c.group_id)],
            PlatformCredentials::Instagram(c) => [
                ("access_token", &c.access_token),
                ("business_account_id", &c.business_account_id),
            ],
            PlatformCredentials::Facebook(c) => [("access_token", &c.access_token), ("page_id", &c.page_id)],
        };
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CredentialError::MissingField { platform, field });
            }
        }
        Ok(())
    }
}

/// Credentials supplied for one publish call, keyed by platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    entries: BTreeMap<Platform, PlatformCredentials>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, credentials: PlatformCredentials) -> Self {
        self.insert(credentials);
        self
    }

    pub fn insert(&mut self, credentials: PlatformCredentials) {
        self.entries.insert(credentials.platform(), credentials);
    }

    pub fn get(&self, platform: Platform) -> Option<&PlatformCredentials> {
        self.entries.get(&platform)
    }

    /// Validated credentials for `platform`, or the reason they cannot be used.
    pub fn require(&self, platform: Platform) -> Result<&PlatformCredentials, CredentialError> {
        let creds = self.get(platform).ok_or(CredentialError::NotConfigured { platform })?;
        creds.validate()?;
        Ok(creds)
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.entries.keys().copied()
    }
}

/// Mask a secret for logs: keep a short prefix only.
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    if secret.chars().count() <= 6 {
        "***".to_string()
    } else {
        format!("{prefix}***")
    }
}
