use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::models::types::{ContentId, ImageRef};

/// A post to publish, as read from the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct ContentItem {
    #[builder(into)]
    pub id: ContentId,
    #[builder(into)]
    pub title: Option<String>,
    /// Rich-text HTML body.
    #[builder(into, default)]
    pub body: String,
    #[builder(into)]
    pub image: Option<ImageRef>,
    #[builder(default)]
    pub additional_images: Vec<ImageRef>,
    #[builder(into)]
    pub video: Option<String>,
    #[builder(default)]
    pub hashtags: Vec<String>,
}

impl ContentItem {
    /// Primary image first, then additional images in order; empty references skipped.
    pub fn all_images(&self) -> Vec<ImageRef> {
        self.image
            .iter()
            .chain(self.additional_images.iter())
            .filter(|r| !r.is_empty())
            .cloned()
            .collect()
    }

    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}
