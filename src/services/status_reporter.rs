use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::models::platform::Platform;
use crate::models::publication::PublicationResult;
use crate::models::types::ContentId;
use crate::traits::content_store::ContentStore;

/// Writes per-platform results into the content item's status map.
pub struct StatusReporter {
    store: Arc<dyn ContentStore>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Read, merge, write back. Keys for platforms not in `results` are left as they were.
    pub async fn report(
        &self,
        id: &ContentId,
        results: &BTreeMap<Platform, PublicationResult>,
    ) -> Result<(), StoreError> {
        let current = self.store.fetch_status_map(id).await?;
        let merged = merge_status_map(current.as_ref(), results);
        self.store.write_status_map(id, merged).await?;
        info!(content_id = %id, platforms = results.len(), "status: recorded");
        Ok(())
    }
}

/// Merges `results` into the stored map.
///
/// A map stored as a JSON string is parsed first and written back as a string;
/// an unparsable value counts as empty.
pub fn merge_status_map(current: Option<&Value>, results: &BTreeMap<Platform, PublicationResult>) -> Value {
    let (mut map, as_string) = match current {
        Some(Value::Object(obj)) => (obj.clone(), false),
        Some(Value::String(raw)) => {
            let parsed = match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(obj)) => obj,
                Ok(_) | Err(_) => {
                    warn!("status: stored map is not a JSON object, starting from empty");
                    Map::new()
                }
            };
            (parsed, true)
        }
        _ => (Map::new(), false),
    };

    for (platform, result) in results {
        let mut entry = match map.remove(platform.as_str()) {
            Some(Value::Object(existing)) => existing,
            _ => Map::new(),
        };
        entry.insert("status".into(), json!(result.status()));
        entry.insert("publishedAt".into(), json!(result.published_at().map(|t| t.to_rfc3339())));
        entry.insert("postUrl".into(), json!(result.post_url()));
        entry.insert("postId".into(), json!(result.post_id()));
        entry.insert("error".into(), json!(result.error()));
        map.insert(platform.as_str().to_string(), Value::Object(entry));
    }

    if as_string {
        Value::String(Value::Object(map).to_string())
    } else {
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::platform::PublicationShape;
    use crate::models::publication::PublishedPost;
    use pretty_assertions::assert_eq;

    fn telegram_ok() -> BTreeMap<Platform, PublicationResult> {
        let post = PublishedPost::new(PublicationShape::Text, "https://t.me/c/1/7", Some("7".into()));
        BTreeMap::from([(Platform::Telegram, PublicationResult::published(Platform::Telegram, post))])
    }

    #[test]
    fn other_platforms_are_untouched() {
        let current = json!({
            "vk": { "status": "published", "postUrl": "https://vk.com/wall-1_2", "selected": true }
        });
        let merged = merge_status_map(Some(&current), &telegram_ok());
        assert_eq!(merged["vk"], current["vk"]);
        assert_eq!(merged["telegram"]["status"], "published");
        assert_eq!(merged["telegram"]["postUrl"], "https://t.me/c/1/7");
        assert_eq!(merged["telegram"]["error"], Value::Null);
    }

    #[test]
    fn existing_entry_keeps_unknown_fields() {
        let current = json!({ "telegram": { "selected": true, "status": "pending" } });
        let merged = merge_status_map(Some(&current), &telegram_ok());
        assert_eq!(merged["telegram"]["selected"], true);
        assert_eq!(merged["telegram"]["status"], "published");
    }

    #[test]
    fn string_maps_round_trip_as_strings() {
        let current = Value::String(r#"{"vk":{"status":"failed","error":"x"}}"#.into());
        let merged = merge_status_map(Some(&current), &telegram_ok());
        let Value::String(raw) = merged else { panic!("expected string") };
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["vk"]["error"], "x");
        assert_eq!(parsed["telegram"]["status"], "published");
    }

    #[test]
    fn unparsable_string_counts_as_empty() {
        let current = Value::String("not json".into());
        let failed = BTreeMap::from([(Platform::Vk, PublicationResult::failed(Platform::Vk, "boom"))]);
        let Value::String(raw) = merge_status_map(Some(&current), &failed) else { panic!("expected string") };
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, json!({ "vk": {
            "status": "failed", "publishedAt": null, "postUrl": null, "postId": null, "error": "boom"
        }}));
    }

    #[test]
    fn missing_map_starts_empty() {
        let merged = merge_status_map(None, &telegram_ok());
        assert_eq!(merged.as_object().map(|m| m.len()), Some(1));
    }
}
