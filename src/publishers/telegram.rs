use async_trait::async_trait;
use bon::Builder;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::error::BoxError;
use crate::models::config::TelegramApiConfig;
use crate::models::platform::{Platform, PublicationShape};
use crate::models::publication::PublishedPost;
use crate::models::credentials::PlatformCredentials;
use crate::publishers::utils::{http_client, preview, truncate_with_ellipsis};
use crate::services::text_adapter::{
    TELEGRAM_CAPTION_LIMIT, TELEGRAM_MESSAGE_LIMIT, escape_html, strip_markup, truncate_html,
};
use crate::traits::publisher::{PlatformPublisher, PublishRequest, mismatch};

/// Max photos per `sendMediaGroup` call.
pub const MEDIA_GROUP_LIMIT: usize = 10;
/// Short caption (title only) used when the text goes in its own message.
pub const SHORT_CAPTION_LIMIT: usize = 200;

/// Telegram Bot API publisher.
#[derive(Builder)]
pub struct TelegramPublisher {
    pub client: Client,
    #[builder(into)]
    pub base_url: String,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("{message}")]
struct ApiFailure {
    message: String,
    /// Telegram refused the HTML markup itself; worth retrying as plain text.
    bad_markup: bool,
}

impl TelegramPublisher {
    pub fn from_config(cfg: &TelegramApiConfig) -> Result<Self, BoxError> {
        Ok(Self::builder()
            .client(http_client(cfg.timeout_secs())?)
            .base_url(cfg.api_base_url().trim_end_matches('/'))
            .build())
    }

    async fn call(&self, token: &str, method: &str, payload: &Value) -> Result<Value, ApiFailure> {
        let url = format!("{}/bot{}/{}", self.base_url, token, method);
        let res = self.client.post(&url).json(payload).send().await.map_err(|e| {
            error!(method = method, error = %e, "telegram: HTTP error");
            ApiFailure { message: format!("telegram {method}: HTTP error: {e}"), bad_markup: false }
        })?;
        let code = res.status();
        let text = res.text().await.unwrap_or_default();
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        if code.is_success() && body.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(body.get("result").cloned().unwrap_or(Value::Null));
        }
        let description = body
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| preview(&text));
        warn!(method = method, status = %code, description = %description, "telegram: API rejected request");
        let bad_markup = code == StatusCode::BAD_REQUEST && is_markup_error(&description);
        Err(ApiFailure { message: format!("telegram {method}: {code}: {description}"), bad_markup })
    }

    /// Sends with `parse_mode=HTML`; a markup rejection is retried once as plain text.
    async fn send(&self, token: &str, method: &str, mut payload: Value, text_field: &str) -> Result<Value, BoxError> {
        payload["parse_mode"] = json!("HTML");
        match self.call(token, method, &payload).await {
            Ok(result) => Ok(result),
            Err(e) if e.bad_markup => {
                info!(method = method, "telegram: retrying as plain text");
                strip_payload(&mut payload, text_field);
                Ok(self.call(token, method, &payload).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn send_message(&self, token: &str, chat_id: &str, text: &str) -> Result<i64, BoxError> {
        let text = truncate_html(text, TELEGRAM_MESSAGE_LIMIT);
        let result = self.send(token, "sendMessage", json!({ "chat_id": chat_id, "text": text }), "text").await?;
        message_id(&result)
    }

    async fn send_single(&self, token: &str, chat_id: &str, method: &str, field: &str, url: &str, caption: &str) -> Result<i64, BoxError> {
        let mut payload = json!({ "chat_id": chat_id });
        payload[field] = json!(url);
        if !caption.is_empty() {
            payload["caption"] = json!(truncate_html(caption, TELEGRAM_CAPTION_LIMIT));
        }
        let result = self.send(token, method, payload, "caption").await?;
        message_id(&result)
    }

    /// Photos in batches of ten; caption on the very first item. Returns the first message id.
    async fn send_photos(&self, token: &str, chat_id: &str, images: &[String], caption: &str) -> Result<i64, BoxError> {
        if images.len() == 1 {
            return self.send_single(token, chat_id, "sendPhoto", "photo", &images[0], caption).await;
        }
        let mut first: Option<i64> = None;
        for (batch_no, batch) in images.chunks(MEDIA_GROUP_LIMIT).enumerate() {
            if batch.len() == 1 {
                let id = self.send_single(token, chat_id, "sendPhoto", "photo", &batch[0], "").await?;
                first.get_or_insert(id);
                continue;
            }
            let media: Vec<Value> = batch
                .iter()
                .enumerate()
                .map(|(i, url)| {
                    let mut item = json!({ "type": "photo", "media": url });
                    if batch_no == 0 && i == 0 && !caption.is_empty() {
                        item["caption"] = json!(truncate_html(caption, TELEGRAM_CAPTION_LIMIT));
                        item["parse_mode"] = json!("HTML");
                    }
                    item
                })
                .collect();
            let payload = json!({ "chat_id": chat_id, "media": media });
            let result = match self.call(token, "sendMediaGroup", &payload).await {
                Ok(r) => r,
                Err(e) if e.bad_markup && batch_no == 0 && !caption.is_empty() => {
                    let mut plain = payload.clone();
                    if let Some(item) = plain["media"].get_mut(0) {
                        strip_payload(item, "caption");
                    }
                    self.call(token, "sendMediaGroup", &plain).await?
                }
                Err(e) => return Err(e.into()),
            };
            let id = result
                .as_array()
                .and_then(|msgs| msgs.first())
                .ok_or("telegram sendMediaGroup: empty result")
                .and_then(|m| message_id(m).map_err(|_| "telegram sendMediaGroup: no message_id"))?;
            first.get_or_insert(id);
        }
        first.ok_or_else(|| "telegram: no photos sent".into())
    }
}

fn strip_payload(payload: &mut Value, text_field: &str) {
    if let Some(obj) = payload.as_object_mut() {
        obj.remove("parse_mode");
        if let Some(text) = obj.get(text_field).and_then(Value::as_str) {
            let plain = strip_markup(text);
            obj.insert(text_field.to_string(), Value::String(plain));
        }
    }
}

/// 400 answers about entities or tags, e.g. "Bad Request: can't parse entities".
fn is_markup_error(description: &str) -> bool {
    let d = description.to_ascii_lowercase();
    d.contains("parse entities") || d.contains("start tag") || d.contains("end tag")
}

fn message_id(result: &Value) -> Result<i64, BoxError> {
    result
        .get("message_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| "telegram: response has no message_id".into())
}

/// Bare numeric ids get the `-100` channel prefix; `@name` and signed ids are kept.
pub fn normalize_chat_id(raw: &str) -> String {
    let id = raw.trim();
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        format!("-100{id}")
    } else {
        id.to_string()
    }
}

pub fn message_url(chat_id: &str, message_id: i64) -> String {
    if let Some(name) = chat_id.strip_prefix('@') {
        format!("https://t.me/{name}/{message_id}")
    } else if let Some(rest) = chat_id.strip_prefix("-100") {
        format!("https://t.me/c/{rest}/{message_id}")
    } else {
        format!("https://t.me/c/{}/{message_id}", chat_id.trim_start_matches('-'))
    }
}

/// Three-way choice on media presence and text length.
pub fn plan(image_count: usize, has_video: bool, text_len: usize) -> PublicationShape {
    let fits_caption = text_len <= TELEGRAM_CAPTION_LIMIT;
    match (image_count, has_video) {
        (1, _) if fits_caption => PublicationShape::PhotoWithCaption,
        (0, true) if fits_caption => PublicationShape::Video,
        (0, false) => PublicationShape::Text,
        _ => PublicationShape::MediaThenText,
    }
}

/// Title-only caption, HTML-escaped.
pub fn short_caption(title: &str) -> String {
    escape_html(&truncate_with_ellipsis(title.trim(), SHORT_CAPTION_LIMIT))
}

#[async_trait]
impl PlatformPublisher for TelegramPublisher {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn publish(&self, req: &PublishRequest<'_>) -> Result<PublishedPost, BoxError> {
        let PlatformCredentials::Telegram(creds) = req.credentials else {
            return Err(mismatch(Platform::Telegram, req.credentials));
        };
        let token = creds.bot_token.trim();
        let chat_id = normalize_chat_id(&creds.chat_id);
        let text = req.text.text.as_str();
        let shape = plan(req.images.len(), req.video.is_some(), req.text.length);
        info!(chat_id = %chat_id, shape = %shape, images = req.images.len(), text_len = req.text.length, "telegram: publish");

        let first_id = match shape {
            PublicationShape::PhotoWithCaption => {
                self.send_single(token, &chat_id, "sendPhoto", "photo", &req.images[0], text).await?
            }
            PublicationShape::Video => {
                let video = req.video.unwrap_or_default();
                self.send_single(token, &chat_id, "sendVideo", "video", video, text).await?
            }
            PublicationShape::MediaThenText => {
                let caption = short_caption(req.title());
                let first = if req.images.is_empty() {
                    let video = req.video.unwrap_or_default();
                    self.send_single(token, &chat_id, "sendVideo", "video", video, &caption).await?
                } else {
                    self.send_photos(token, &chat_id, req.images, &caption).await?
                };
                // медиа уже опубликованы: сбой текста не отменяет пост
                if !text.trim().is_empty() {
                    if let Err(e) = self.send_message(token, &chat_id, text).await {
                        warn!(chat_id = %chat_id, message_id = first, error = %e, "telegram: follow-up text not sent");
                    }
                }
                first
            }
            _ => {
                if text.trim().is_empty() {
                    return Err("telegram: nothing to send".into());
                }
                self.send_message(token, &chat_id, text).await?
            }
        };

        let url = message_url(&chat_id, first_id);
        Ok(PublishedPost::new(shape, url, Some(first_id.to_string())))
    }
}
