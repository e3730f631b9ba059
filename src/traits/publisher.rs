use async_trait::async_trait;

use crate::error::{BoxError, CredentialError};
use crate::models::content::ContentItem;
use crate::models::credentials::PlatformCredentials;
use crate::models::platform::Platform;
use crate::models::publication::PublishedPost;
use crate::services::text_adapter::PlatformText;

/// Всё, что нужно издателю для одной публикации
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub content: &'a ContentItem,
    /// Text already adapted to this platform's dialect.
    pub text: &'a PlatformText,
    /// Resolved image URLs, primary first.
    pub images: &'a [String],
    pub video: Option<&'a str>,
    pub credentials: &'a PlatformCredentials,
}

impl<'a> PublishRequest<'a> {
    pub fn title(&self) -> &'a str {
        self.content.title_or_empty()
    }
}

#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    fn platform(&self) -> Platform;

    /// Runs the platform's call sequence. An `Err` means every shape failed.
    async fn publish(&self, req: &PublishRequest<'_>) -> Result<PublishedPost, BoxError>;
}

/// Rejects credentials meant for another platform.
pub fn mismatch(expected: Platform, creds: &PlatformCredentials) -> BoxError {
    CredentialError::PlatformMismatch { expected, found: creds.platform() }.into()
}
