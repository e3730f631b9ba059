use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, IntoStaticStr};
use strum_macros::Display as StrumDisplay;

/// Target social platform.
///
/// Declaration order is the processing order used by the orchestrator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    EnumString, IntoStaticStr, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Vk,
    Instagram,
    Facebook,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn all() -> Vec<Platform> {
        vec![
            Platform::Telegram,
            Platform::Vk,
            Platform::Instagram,
            Platform::Facebook,
        ]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structural form a post takes on a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PublicationShape {
    /// Album with every image (Facebook) or carousel container (Instagram).
    Carousel,
    /// Feed post referencing unpublished photo handles.
    AttachedMedia,
    /// One photo carrying the post text.
    SinglePhoto,
    Video,
    /// Text post with image URLs appended as links.
    TextWithLinks,
    /// Telegram: one photo, full text as caption.
    PhotoWithCaption,
    /// Telegram: photos (or video) with a short caption, then the text as its own message.
    MediaThenText,
    Text,
    /// VK: wall post with uploaded photo attachments.
    WallPost,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn platform_string_conversion() {
        assert_eq!(Platform::Telegram.as_str(), "telegram");
        assert_eq!(Platform::Vk.as_str(), "vk");
        assert_eq!(Platform::Instagram.as_str(), "instagram");
        assert_eq!(Platform::Facebook.as_str(), "facebook");
    }

    #[test]
    fn platform_from_string() {
        assert_eq!(Platform::from_str("telegram").unwrap(), Platform::Telegram);
        assert_eq!(Platform::from_str("VK").unwrap(), Platform::Vk);
        assert_eq!(Platform::from_str("Facebook").unwrap(), Platform::Facebook);
        assert!(Platform::from_str("mastodon").is_err());
    }

    #[test]
    fn platform_display_and_serde_agree() {
        for p in Platform::all() {
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p));
        }
    }

    #[test]
    fn platform_order_is_processing_order() {
        let mut all = Platform::all();
        all.reverse();
        all.sort();
        assert_eq!(all, Platform::all());
    }

    #[test]
    fn shape_display_is_snake_case() {
        assert_eq!(PublicationShape::AttachedMedia.to_string(), "attached_media");
        assert_eq!(PublicationShape::TextWithLinks.to_string(), "text_with_links");
    }
}
