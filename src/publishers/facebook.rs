use std::collections::HashSet;

use async_trait::async_trait;
use bon::Builder;
use futures_util::FutureExt;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::BoxError;
use crate::models::config::GraphApiConfig;
use crate::models::credentials::{FacebookCredentials, PlatformCredentials, mask_secret};
use crate::models::platform::{Platform, PublicationShape};
use crate::models::publication::PublishedPost;
use crate::publishers::graph::{GraphClient, id_of, require_id};
use crate::publishers::ladder::{Rung, climb};
use crate::publishers::utils::http_client;
use crate::traits::publisher::{PlatformPublisher, PublishRequest, mismatch};

const SERIES_NOTE: &str = "\n\n(first image of a series)";

/// Facebook page publisher. Ladder: album, attached media, single photo, video, text with links.
#[derive(Builder)]
pub struct FacebookPublisher {
    graph: GraphClient,
}

impl FacebookPublisher {
    pub fn from_config(cfg: &GraphApiConfig) -> Result<Self, BoxError> {
        let client = http_client(cfg.timeout_secs())?;
        Ok(Self::builder()
            .graph(GraphClient::new(client, cfg.graph_base_url(), cfg.api_version()))
            .build())
    }

    /// Exchanges the user token for the page token; falls back to the user token.
    pub async fn page_token(&self, creds: &FacebookCredentials) -> String {
        let params = [("access_token", creds.access_token.clone()), ("fields", "id,access_token".to_string())];
        match self.graph.get("me/accounts", &params).await {
            Ok(body) => {
                let pages = body.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
                let token = pages
                    .iter()
                    .find(|p| id_of(p, "id").as_deref() == Some(creds.page_id.as_str()))
                    .and_then(|p| p.get("access_token").and_then(Value::as_str))
                    .map(str::to_string);
                match token {
                    Some(token) => {
                        info!(page_id = %creds.page_id, token = %mask_secret(&token), "facebook: using page token");
                        token
                    }
                    None => {
                        warn!(page_id = %creds.page_id, pages = pages.len(), "facebook: page not in /me/accounts, using user token");
                        creds.access_token.clone()
                    }
                }
            }
            Err(e) => {
                warn!(page_id = %creds.page_id, error = %e, "facebook: page token lookup failed, using user token");
                creds.access_token.clone()
            }
        }
    }

    async fn carousel(&self, ctx: &PostCtx<'_>) -> Result<PublishedPost, BoxError> {
        let name = if ctx.title.is_empty() { "Album" } else { ctx.title };
        let album = self
            .graph
            .post(
                &format!("{}/albums", ctx.page_id),
                &[("name", name.to_string()), ("message", ctx.message.to_string()), ctx.token()],
            )
            .await?;
        let album_id = require_id(&album, "id", "album")?;
        info!(album_id = %album_id, images = ctx.images.len(), "facebook: album created");
        for url in ctx.images {
            self.graph
                .post(&format!("{}/photos", album_id), &[("url", url.clone()), ctx.token()])
                .await?;
        }
        let post_url = format!("https://facebook.com/media/set/?set=a.{}", album_id);
        Ok(PublishedPost::new(PublicationShape::Carousel, post_url, Some(album_id)))
    }

    async fn attached_media(&self, ctx: &PostCtx<'_>) -> Result<PublishedPost, BoxError> {
        let mut handles = Vec::with_capacity(ctx.images.len());
        for url in ctx.images {
            let photo = self
                .graph
                .post(
                    &format!("{}/photos", ctx.page_id),
                    &[("url", url.clone()), ("published", "false".to_string()), ctx.token()],
                )
                .await?;
            handles.push(require_id(&photo, "id", "unpublished photo")?);
        }
        let mut params = vec![("message", ctx.message.to_string()), ctx.token()];
        let keys: Vec<String> = (0..handles.len()).map(|i| format!("attached_media[{i}]")).collect();
        for (key, handle) in keys.iter().zip(&handles) {
            params.push((key.as_str(), json!({ "media_fbid": handle }).to_string()));
        }
        let post = self.graph.post(&format!("{}/feed", ctx.page_id), &params).await?;
        let id = require_id(&post, "id", "feed")?;
        Ok(PublishedPost::new(PublicationShape::AttachedMedia, post_url(ctx.page_id, &id), Some(id)))
    }

    async fn single_photo(&self, ctx: &PostCtx<'_>, note: bool) -> Result<PublishedPost, BoxError> {
        let url = ctx.images.first().ok_or("no image to post")?;
        let mut message = ctx.message.to_string();
        if note {
            message.push_str(SERIES_NOTE);
        }
        let photo = self
            .graph
            .post(&format!("{}/photos", ctx.page_id), &[("url", url.clone()), ("message", message), ctx.token()])
            .await?;
        let id = id_of(&photo, "post_id")
            .or_else(|| id_of(&photo, "id"))
            .ok_or("photo response has no id")?;
        Ok(PublishedPost::new(PublicationShape::SinglePhoto, post_url(ctx.page_id, &id), Some(id)))
    }

    async fn video(&self, ctx: &PostCtx<'_>) -> Result<PublishedPost, BoxError> {
        let video = ctx.video.ok_or("no video to post")?;
        let body = self
            .graph
            .post(
                &format!("{}/videos", ctx.page_id),
                &[("file_url", video.to_string()), ("description", ctx.message.to_string()), ctx.token()],
            )
            .await?;
        let id = require_id(&body, "id", "video")?;
        let url = format!("https://facebook.com/{}/videos/{}", ctx.page_id, id);
        Ok(PublishedPost::new(PublicationShape::Video, url, Some(id)))
    }

    async fn text_with_links(&self, ctx: &PostCtx<'_>) -> Result<PublishedPost, BoxError> {
        let mut message = ctx.message.to_string();
        if !ctx.images.is_empty() {
            message.push_str("\n\n");
            message.push_str(&ctx.images.join("\n"));
        }
        let mut params = vec![("message", message), ctx.token()];
        if let Some(first) = ctx.images.first() {
            params.push(("link", first.clone()));
        }
        let post = self.graph.post(&format!("{}/feed", ctx.page_id), &params).await?;
        let id = require_id(&post, "id", "feed")?;
        Ok(PublishedPost::new(PublicationShape::TextWithLinks, post_url(ctx.page_id, &id), Some(id)))
    }
}

/// Shapes tried for a post, richest first.
///
/// An album needs the primary image plus at least one other distinct image.
pub fn shapes_for(has_primary: bool, image_count: usize, has_video: bool) -> Vec<PublicationShape> {
    let mut shapes = Vec::new();
    if has_primary && image_count >= 2 {
        shapes.extend([PublicationShape::Carousel, PublicationShape::AttachedMedia]);
    }
    if image_count >= 1 {
        shapes.push(PublicationShape::SinglePhoto);
    }
    if has_video {
        shapes.push(PublicationShape::Video);
    }
    shapes.push(PublicationShape::TextWithLinks);
    shapes
}

/// Drops repeated URLs, keeping first occurrences in order.
pub fn distinct_images(images: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    images.iter().filter(|url| seen.insert(url.as_str())).cloned().collect()
}

/// Feed ids already carry the page prefix (`page_post`).
pub fn post_url(page_id: &str, id: &str) -> String {
    if id.contains('_') {
        format!("https://facebook.com/{}", id)
    } else {
        format!("https://facebook.com/{}/posts/{}", page_id, id)
    }
}

struct PostCtx<'a> {
    page_id: &'a str,
    token: String,
    title: &'a str,
    message: &'a str,
    images: &'a [String],
    video: Option<&'a str>,
}

impl PostCtx<'_> {
    fn token(&self) -> (&'static str, String) {
        ("access_token", self.token.clone())
    }
}

#[async_trait]
impl PlatformPublisher for FacebookPublisher {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn publish(&self, req: &PublishRequest<'_>) -> Result<PublishedPost, BoxError> {
        let PlatformCredentials::Facebook(creds) = req.credentials else {
            return Err(mismatch(Platform::Facebook, req.credentials));
        };
        let token = self.page_token(creds).await;
        let images = distinct_images(req.images);
        let has_primary = req.content.image.as_ref().is_some_and(|i| !i.is_empty());
        let ctx = PostCtx {
            page_id: creds.page_id.trim(),
            token,
            title: req.title(),
            message: &req.text.text,
            images: &images,
            video: req.video,
        };
        let series = has_primary && ctx.images.len() >= 2;
        let rungs: Vec<Rung<'_>> = shapes_for(has_primary, ctx.images.len(), ctx.video.is_some())
            .into_iter()
            .map(|shape| {
                let ctx = &ctx;
                match shape {
                    PublicationShape::Carousel => Rung::new(shape, move || self.carousel(ctx).boxed()),
                    PublicationShape::AttachedMedia => Rung::new(shape, move || self.attached_media(ctx).boxed()),
                    PublicationShape::SinglePhoto => Rung::new(shape, move || self.single_photo(ctx, series).boxed()),
                    PublicationShape::Video => Rung::new(shape, move || self.video(ctx).boxed()),
                    _ => Rung::new(shape, move || self.text_with_links(ctx).boxed()),
                }
            })
            .collect();
        climb(Platform::Facebook, rungs).await.result
    }
}
