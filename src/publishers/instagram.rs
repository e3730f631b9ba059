use std::time::Duration;

use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use bon::Builder;
use futures_util::FutureExt;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::BoxError;
use crate::models::config::GraphApiConfig;
use crate::models::credentials::PlatformCredentials;
use crate::models::platform::{Platform, PublicationShape};
use crate::models::publication::PublishedPost;
use crate::publishers::graph::{GraphClient, require_id};
use crate::publishers::ladder::{Rung, climb};
use crate::publishers::utils::http_client;
use crate::traits::publisher::{PlatformPublisher, PublishRequest, mismatch};

/// Max children in one carousel container.
pub const CAROUSEL_LIMIT: usize = 10;

/// Instagram business account publisher (Graph API media containers).
#[derive(Builder)]
pub struct InstagramPublisher {
    graph: GraphClient,
    #[builder(default = 10)]
    poll_attempts: usize,
    #[builder(default = Duration::from_secs(5))]
    poll_interval: Duration,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
enum ContainerState {
    #[display("media container still processing")]
    Pending,
    #[display("media container failed: {reason}")]
    Failed { reason: String },
}

struct IgCtx<'a> {
    account: &'a str,
    token: &'a str,
    caption: &'a str,
    images: &'a [String],
    video: Option<&'a str>,
}

impl IgCtx<'_> {
    fn token(&self) -> (&'static str, String) {
        ("access_token", self.token.to_string())
    }
}

impl InstagramPublisher {
    pub fn from_config(cfg: &GraphApiConfig) -> Result<Self, BoxError> {
        let client = http_client(cfg.timeout_secs())?;
        Ok(Self::builder()
            .graph(GraphClient::new(client, cfg.graph_base_url(), cfg.api_version()))
            .poll_attempts(cfg.poll_attempts())
            .poll_interval(Duration::from_secs(cfg.poll_interval_secs()))
            .build())
    }

    async fn container(&self, ctx: &IgCtx<'_>, params: Vec<(&str, String)>) -> Result<String, BoxError> {
        let mut params = params;
        params.push(ctx.token());
        let body = self.graph.post(&format!("{}/media", ctx.account), &params).await?;
        require_id(&body, "id", "media container")
    }

    async fn publish_container(&self, ctx: &IgCtx<'_>, shape: PublicationShape, creation_id: String) -> Result<PublishedPost, BoxError> {
        let body = self
            .graph
            .post(&format!("{}/media_publish", ctx.account), &[("creation_id", creation_id), ctx.token()])
            .await?;
        let media_id = require_id(&body, "id", "media_publish")?;
        let url = self.permalink(ctx, &media_id).await;
        Ok(PublishedPost::new(shape, url, Some(media_id)))
    }

    async fn permalink(&self, ctx: &IgCtx<'_>, media_id: &str) -> String {
        let fallback = format!("https://www.instagram.com/p/{}/", media_id);
        match self.graph.get(media_id, &[("fields", "permalink".to_string()), ctx.token()]).await {
            Ok(body) => body
                .get("permalink")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(fallback),
            Err(e) => {
                warn!(media_id = %media_id, error = %e, "instagram: permalink lookup failed");
                fallback
            }
        }
    }

    async fn carousel(&self, ctx: &IgCtx<'_>) -> Result<PublishedPost, BoxError> {
        let mut children = Vec::new();
        for url in ctx.images.iter().take(CAROUSEL_LIMIT) {
            let id = self
                .container(ctx, vec![("image_url", url.clone()), ("is_carousel_item", "true".to_string())])
                .await?;
            children.push(id);
        }
        let creation_id = self
            .container(
                ctx,
                vec![
                    ("media_type", "CAROUSEL".to_string()),
                    ("children", children.join(",")),
                    ("caption", ctx.caption.to_string()),
                ],
            )
            .await?;
        info!(children = children.len(), creation_id = %creation_id, "instagram: carousel container ready");
        self.publish_container(ctx, PublicationShape::Carousel, creation_id).await
    }

    async fn single_image(&self, ctx: &IgCtx<'_>) -> Result<PublishedPost, BoxError> {
        let url = ctx.images.first().ok_or("no image to post")?;
        let creation_id = self
            .container(ctx, vec![("image_url", url.clone()), ("caption", ctx.caption.to_string())])
            .await?;
        self.publish_container(ctx, PublicationShape::SinglePhoto, creation_id).await
    }

    async fn reel(&self, ctx: &IgCtx<'_>) -> Result<PublishedPost, BoxError> {
        let video = ctx.video.ok_or("no video to post")?;
        let creation_id = self
            .container(
                ctx,
                vec![
                    ("media_type", "REELS".to_string()),
                    ("video_url", video.to_string()),
                    ("caption", ctx.caption.to_string()),
                ],
            )
            .await?;
        self.wait_until_finished(ctx, &creation_id).await?;
        self.publish_container(ctx, PublicationShape::Video, creation_id).await
    }

    /// Video containers are processed asynchronously; poll `status_code` until FINISHED.
    async fn wait_until_finished(&self, ctx: &IgCtx<'_>, creation_id: &str) -> Result<(), BoxError> {
        let check = || async move {
            let body = self
                .graph
                .get(creation_id, &[("fields", "status_code".to_string()), ctx.token()])
                .await
                .map_err(|e| ContainerState::Failed { reason: e.to_string() })?;
            match body.get("status_code").and_then(Value::as_str).unwrap_or("") {
                "FINISHED" => Ok(()),
                "ERROR" | "EXPIRED" => Err(ContainerState::Failed {
                    reason: body.get("status").and_then(Value::as_str).unwrap_or("processing error").to_string(),
                }),
                _ => Err(ContainerState::Pending),
            }
        };
        let backoff = ConstantBuilder::default()
            .with_delay(self.poll_interval)
            .with_max_times(self.poll_attempts);
        check
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(|s: &ContainerState| matches!(s, ContainerState::Pending))
            .await?;
        Ok(())
    }
}

/// Shapes tried for a post. No media means no shape: Instagram has no text-only post.
pub fn shapes_for(image_count: usize, has_video: bool) -> Vec<PublicationShape> {
    let mut shapes = Vec::new();
    if image_count >= 2 {
        shapes.push(PublicationShape::Carousel);
    }
    if image_count >= 1 {
        shapes.push(PublicationShape::SinglePhoto);
    }
    if has_video {
        shapes.push(PublicationShape::Video);
    }
    shapes
}

#[async_trait]
impl PlatformPublisher for InstagramPublisher {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn publish(&self, req: &PublishRequest<'_>) -> Result<PublishedPost, BoxError> {
        let PlatformCredentials::Instagram(creds) = req.credentials else {
            return Err(mismatch(Platform::Instagram, req.credentials));
        };
        let shapes = shapes_for(req.images.len(), req.video.is_some());
        if shapes.is_empty() {
            return Err("instagram: a post needs at least one image or a video".into());
        }
        let ctx = IgCtx {
            account: creds.business_account_id.trim(),
            token: creds.access_token.trim(),
            caption: &req.text.text,
            images: req.images,
            video: req.video,
        };
        let rungs: Vec<Rung<'_>> = shapes
            .into_iter()
            .map(|shape| {
                let ctx = &ctx;
                match shape {
                    PublicationShape::Carousel => Rung::new(shape, move || self.carousel(ctx).boxed()),
                    PublicationShape::SinglePhoto => Rung::new(shape, move || self.single_image(ctx).boxed()),
                    _ => Rung::new(shape, move || self.reel(ctx).boxed()),
                }
            })
            .collect();
        climb(Platform::Instagram, rungs).await.result
    }
}
