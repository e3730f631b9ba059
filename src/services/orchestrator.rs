use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bon::bon;
use futures_util::FutureExt;
use tracing::{error, info, warn};

use crate::error::{BoxError, PublishError};
use crate::models::config::AppConfig;
use crate::models::content::ContentItem;
use crate::models::credentials::CredentialSet;
use crate::models::platform::Platform;
use crate::models::publication::{PublicationResult, PublishReport, StatusWrite};
use crate::models::types::ContentId;
use crate::publishers::{FacebookPublisher, InstagramPublisher, TelegramPublisher, VkPublisher};
use crate::services::directus::DirectusStore;
use crate::services::media_resolver::MediaResolver;
use crate::services::status_reporter::StatusReporter;
use crate::services::text_adapter::adapt_text;
use crate::traits::content_store::ContentStore;
use crate::traits::publisher::{PlatformPublisher, PublishRequest};

/// Runs one publish pass: fetch, resolve media, adapt, publish per platform, record status.
pub struct Orchestrator {
    publishers: HashMap<Platform, Arc<dyn PlatformPublisher>>,
    resolver: MediaResolver,
    store: Option<Arc<dyn ContentStore>>,
}

#[bon]
impl Orchestrator {
    #[builder]
    pub fn new(
        #[builder(default)] publishers: Vec<Arc<dyn PlatformPublisher>>,
        resolver: MediaResolver,
        store: Option<Arc<dyn ContentStore>>,
    ) -> Self {
        let publishers = publishers.into_iter().map(|p| (p.platform(), p)).collect();
        Self { publishers, resolver, store }
    }
}

impl Orchestrator {
    /// All four publishers, the configured media hosts and (if configured) Directus.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, BoxError> {
        let platforms = cfg.platforms();
        let publishers: Vec<Arc<dyn PlatformPublisher>> = vec![
            Arc::new(TelegramPublisher::from_config(&platforms.telegram.unwrap_or_default())?),
            Arc::new(VkPublisher::from_config(&platforms.vk.unwrap_or_default())?),
            Arc::new(FacebookPublisher::from_config(&platforms.facebook.unwrap_or_default())?),
            Arc::new(InstagramPublisher::from_config(&platforms.instagram.unwrap_or_default())?),
        ];
        let store: Option<Arc<dyn ContentStore>> = match &cfg.directus {
            Some(directus) => Some(Arc::new(DirectusStore::from_config(directus)?)),
            None => None,
        };
        Ok(Self::builder()
            .publishers(publishers)
            .resolver(MediaResolver::from_config(&cfg.media())?)
            .maybe_store(store)
            .build())
    }

    pub fn resolver(&self) -> &MediaResolver {
        &self.resolver
    }

    /// Publishes a stored content item and records the outcome on it.
    ///
    /// Only an empty platform set and an unreadable content item are errors;
    /// per-platform failures and a failed status write land in the report.
    pub async fn publish(
        &self,
        content_id: &ContentId,
        platforms: impl IntoIterator<Item = Platform>,
        credentials: &CredentialSet,
    ) -> Result<PublishReport, PublishError> {
        let platforms: BTreeSet<Platform> = platforms.into_iter().collect();
        if platforms.is_empty() {
            return Err(PublishError::NoPlatforms);
        }
        let store = self.store.as_ref().ok_or_else(|| PublishError::ContentUnavailable {
            id: content_id.to_string(),
            reason: "no content store configured".to_string(),
        })?;
        let content = store.fetch_content(content_id).await.map_err(|e| {
            error!(content_id = %content_id, error = %e, "publish: content fetch failed");
            PublishError::ContentUnavailable { id: content_id.to_string(), reason: e.to_string() }
        })?;

        let results = self.publish_item(&content, platforms, credentials).await?;

        let status = match StatusReporter::new(store.clone()).report(content_id, &results).await {
            Ok(()) => StatusWrite::Recorded,
            Err(e) => {
                error!(content_id = %content_id, error = %e, "publish: status not recorded");
                StatusWrite::Failed(e.to_string())
            }
        };
        Ok(PublishReport { content_id: content_id.clone(), results, status })
    }

    /// Publishes an item that is already in hand. Nothing is written back.
    pub async fn publish_item(
        &self,
        content: &ContentItem,
        platforms: impl IntoIterator<Item = Platform>,
        credentials: &CredentialSet,
    ) -> Result<BTreeMap<Platform, PublicationResult>, PublishError> {
        let platforms: BTreeSet<Platform> = platforms.into_iter().collect();
        if platforms.is_empty() {
            return Err(PublishError::NoPlatforms);
        }
        info!(content_id = %content.id, platforms = ?platforms, "publish: start");

        let mut results = BTreeMap::new();
        let mut ready = Vec::new();
        for platform in platforms {
            match credentials.require(platform) {
                Ok(creds) => ready.push((platform, creds)),
                Err(e) => {
                    warn!(platform = %platform, error = %e, "publish: credentials rejected");
                    results.insert(platform, PublicationResult::failed(platform, e.to_string()));
                }
            }
        }
        if ready.is_empty() {
            return Ok(results);
        }

        // один раз на вызов, общий для всех платформ
        let images = self.resolver.resolve_or_original(&content.all_images()).await;
        let video = content.video_url();

        for (platform, creds) in ready {
            let Some(publisher) = self.publishers.get(&platform) else {
                warn!(platform = %platform, "publish: no publisher registered");
                results.insert(platform, PublicationResult::failed(platform, format!("no publisher registered for {platform}")));
                continue;
            };
            let text = adapt_text(&content.body, &content.hashtags, platform);
            let req = PublishRequest { content, text: &text, images: &images, video, credentials: creds };

            let result = match AssertUnwindSafe(publisher.publish(&req)).catch_unwind().await {
                Ok(Ok(post)) => {
                    info!(platform = %platform, shape = %post.shape, url = %post.post_url, "publish: published");
                    PublicationResult::published(platform, post)
                }
                Ok(Err(e)) => {
                    error!(platform = %platform, error = %e, "publish: failed");
                    PublicationResult::failed(platform, e.to_string())
                }
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!(platform = %platform, panic = %reason, "publish: publisher panicked");
                    PublicationResult::failed(platform, format!("publisher panicked: {reason}"))
                }
            };
            results.insert(platform, result);
        }
        Ok(results)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credentials::{PlatformCredentials, TelegramCredentials};
    use crate::models::publication::{PublicationStatus, PublishedPost};
    use crate::models::platform::PublicationShape;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        platform: Platform,
        calls: AtomicUsize,
        panics: bool,
    }

    #[async_trait]
    impl PlatformPublisher for Fixed {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn publish(&self, req: &PublishRequest<'_>) -> Result<PublishedPost, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panics {
                panic!("boom");
            }
            Ok(PublishedPost::new(PublicationShape::Text, format!("https://example.com/{}", req.text.length), None))
        }
    }

    fn fixed(platform: Platform, panics: bool) -> Arc<Fixed> {
        Arc::new(Fixed { platform, calls: AtomicUsize::new(0), panics })
    }

    fn telegram_creds() -> CredentialSet {
        CredentialSet::new().with(PlatformCredentials::Telegram(TelegramCredentials {
            bot_token: "123:abc".into(),
            chat_id: "@chan".into(),
        }))
    }

    fn item() -> ContentItem {
        ContentItem::builder().id("42").body("<p>hi</p>").build()
    }

    #[tokio::test]
    async fn empty_platform_set_is_an_error() {
        let orch = Orchestrator::builder().resolver(MediaResolver::builder().build()).build();
        let err = orch.publish_item(&item(), Vec::<Platform>::new(), &telegram_creds()).await.unwrap_err();
        assert_eq!(err, PublishError::NoPlatforms);
    }

    #[tokio::test]
    async fn panic_is_contained_to_its_platform() {
        let telegram = fixed(Platform::Telegram, true);
        let orch = Orchestrator::builder()
            .publishers(vec![telegram.clone() as Arc<dyn PlatformPublisher>])
            .resolver(MediaResolver::builder().build())
            .build();
        let results = orch
            .publish_item(&item(), [Platform::Telegram, Platform::Vk], &telegram_creds())
            .await
            .unwrap();

        let tg = &results[&Platform::Telegram];
        assert_eq!(tg.status(), PublicationStatus::Failed);
        assert_eq!(tg.error(), Some("publisher panicked: boom"));
        assert_eq!(telegram.calls.load(Ordering::SeqCst), 1);
        assert!(results[&Platform::Vk].error().unwrap_or_default().contains("no credentials"));
    }

    #[tokio::test]
    async fn missing_credentials_never_reach_the_publisher() {
        let vk = fixed(Platform::Vk, false);
        let telegram = fixed(Platform::Telegram, false);
        let orch = Orchestrator::builder()
            .publishers(vec![vk.clone() as Arc<dyn PlatformPublisher>, telegram.clone() as Arc<dyn PlatformPublisher>])
            .resolver(MediaResolver::builder().build())
            .build();
        let results = orch
            .publish_item(&item(), [Platform::Vk, Platform::Telegram], &telegram_creds())
            .await
            .unwrap();
        assert_eq!(vk.calls.load(Ordering::SeqCst), 0);
        assert!(results[&Platform::Telegram].is_published());
        assert!(!results[&Platform::Vk].is_published());
    }

    #[tokio::test]
    async fn publish_without_store_is_content_unavailable() {
        let orch = Orchestrator::builder().resolver(MediaResolver::builder().build()).build();
        let err = orch
            .publish(&ContentId::from("7"), [Platform::Telegram], &telegram_creds())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::ContentUnavailable { .. }));
    }
}
