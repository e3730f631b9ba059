use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;

use crate::models::platform::{Platform, PublicationShape};
use crate::models::types::ContentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    Published,
    Failed,
}

/// Outcome of one publish attempt on one platform.
///
/// Built only through [`PublicationResult::published`] and [`PublicationResult::failed`],
/// so `published_at`/`post_url` are present exactly when the post was made and
/// `error` exactly when it was not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationResult {
    platform: Platform,
    status: PublicationStatus,
    published_at: Option<DateTime<Utc>>,
    post_url: Option<String>,
    post_id: Option<String>,
    error: Option<String>,
}

impl PublicationResult {
    pub fn published(platform: Platform, post: PublishedPost) -> Self {
        Self {
            platform,
            status: PublicationStatus::Published,
            published_at: Some(Utc::now()),
            post_url: Some(post.post_url),
            post_id: post.post_id,
            error: None,
        }
    }

    pub fn failed(platform: Platform, error: impl Into<String>) -> Self {
        Self {
            platform,
            status: PublicationStatus::Failed,
            published_at: None,
            post_url: None,
            post_id: None,
            error: Some(error.into()),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn status(&self) -> PublicationStatus {
        self.status
    }

    pub fn is_published(&self) -> bool {
        self.status == PublicationStatus::Published
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn post_url(&self) -> Option<&str> {
        self.post_url.as_deref()
    }

    pub fn post_id(&self) -> Option<&str> {
        self.post_id.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// What a publisher returns when a shape went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub shape: PublicationShape,
    pub post_url: String,
    pub post_id: Option<String>,
}

impl PublishedPost {
    pub fn new(shape: PublicationShape, post_url: impl Into<String>, post_id: Option<String>) -> Self {
        Self { shape, post_url: post_url.into(), post_id }
    }
}

/// Whether the merged status map reached the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusWrite {
    Recorded,
    Failed(String),
}

impl StatusWrite {
    pub fn is_recorded(&self) -> bool {
        matches!(self, StatusWrite::Recorded)
    }
}

/// Everything a `publish` call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    pub content_id: ContentId,
    pub results: BTreeMap<Platform, PublicationResult>,
    pub status: StatusWrite,
}

impl PublishReport {
    pub fn result(&self, platform: Platform) -> Option<&PublicationResult> {
        self.results.get(&platform)
    }

    pub fn published_count(&self) -> usize {
        self.results.values().filter(|r| r.is_published()).count()
    }
}
