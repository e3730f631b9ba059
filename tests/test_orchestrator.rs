use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crosspost::error::PublishError;
use crosspost::models::content::ContentItem;
use crosspost::models::credentials::{CredentialSet, PlatformCredentials, TelegramCredentials};
use crosspost::models::platform::Platform;
use crosspost::models::publication::{PublicationStatus, StatusWrite};
use crosspost::models::types::ContentId;
use crosspost::services::directus::DirectusStore;
use crosspost::services::media_resolver::MediaResolver;
use crosspost::services::orchestrator::Orchestrator;
use crosspost::traits::content_store::ContentStore;
use crosspost::traits::publisher::PlatformPublisher;

mod common;

use crate::common::{facebook, json_body, request_log, requests_to, telegram};

const ITEM_PATH: &str = "/items/campaign_content/42";

fn telegram_only() -> CredentialSet {
    CredentialSet::new().with(PlatformCredentials::Telegram(TelegramCredentials {
        bot_token: "TOKEN".into(),
        chat_id: "@chan".into(),
    }))
}

async fn mount_send_message(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": { "message_id": 5 } })))
        .mount(server)
        .await;
}

fn orchestrator(server: &MockServer) -> Orchestrator {
    let store: Arc<dyn ContentStore> = Arc::new(
        DirectusStore::builder()
            .base_url(server.uri())
            .token("T")
            .min_delay(Duration::from_millis(1))
            .max_retries(1)
            .build(),
    );
    Orchestrator::builder()
        .publishers(vec![
            Arc::new(telegram(server)) as Arc<dyn PlatformPublisher>,
            Arc::new(facebook(server)) as Arc<dyn PlatformPublisher>,
        ])
        .resolver(MediaResolver::builder().build())
        .store(store)
        .build()
}

#[tokio::test]
async fn missing_credentials_fail_only_their_platform() {
    let server = MockServer::start().await;
    mount_send_message(&server).await;

    let content = ContentItem::builder().id("42").title("Hi").body("<p>Hello <b>world</b></p>").build();
    let results = orchestrator(&server)
        .publish_item(&content, [Platform::Facebook, Platform::Telegram], &telegram_only())
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let tg = &results[&Platform::Telegram];
    assert_eq!(tg.status(), PublicationStatus::Published);
    assert_eq!(tg.post_url(), Some("https://t.me/chan/5"));
    let fb = &results[&Platform::Facebook];
    assert_eq!(fb.status(), PublicationStatus::Failed);
    assert_eq!(fb.error(), Some("facebook: no credentials configured"));
    assert_eq!(fb.post_url(), None);

    // ни одного запроса к Graph API
    assert_eq!(request_log(&server).await, vec!["POST /botTOKEN/sendMessage"]);
    let sent = json_body(&requests_to(&server, "/botTOKEN/sendMessage").await[0]);
    assert_eq!(sent["text"], "Hello <b>world</b>");
}

#[tokio::test]
async fn status_merge_keeps_other_platforms() {
    let server = MockServer::start().await;
    mount_send_message(&server).await;
    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .and(header("authorization", "Bearer T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": 42,
                "title": "Hi",
                "content": "<p>Hello</p>",
                "social_platforms": {
                    "vk": { "status": "published", "postUrl": "https://vk.com/wall-1_2", "selected": true },
                    "telegram": { "status": "failed", "error": "old", "selected": true }
                }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let report = orchestrator(&server)
        .publish(&ContentId::from("42"), [Platform::Telegram], &telegram_only())
        .await
        .unwrap();
    assert_eq!(report.status, StatusWrite::Recorded);
    assert_eq!(report.published_count(), 1);

    let patch = json_body(&requests_to(&server, ITEM_PATH).await.into_iter().find(|r| r.method.as_str() == "PATCH").unwrap());
    let map = &patch["social_platforms"];
    assert_eq!(map["vk"], json!({ "status": "published", "postUrl": "https://vk.com/wall-1_2", "selected": true }));
    assert_eq!(map["telegram"]["status"], "published");
    assert_eq!(map["telegram"]["postUrl"], "https://t.me/chan/5");
    assert_eq!(map["telegram"]["postId"], "5");
    assert_eq!(map["telegram"]["error"], json!(null));
    assert_eq!(map["telegram"]["selected"], true);
    assert!(map["telegram"]["publishedAt"].is_string());
}

#[tokio::test]
async fn rejected_status_write_is_reported_separately() {
    let server = MockServer::start().await;
    mount_send_message(&server).await;
    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 42, "content": "<p>Hello</p>", "social_platforms": "{\"vk\":{\"status\":\"failed\"}}" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "errors": [{ "message": "forbidden" }] })))
        .expect(1)
        .mount(&server)
        .await;

    let report = orchestrator(&server)
        .publish(&ContentId::from("42"), [Platform::Telegram], &telegram_only())
        .await
        .unwrap();
    assert!(report.result(Platform::Telegram).unwrap().is_published());
    match &report.status {
        StatusWrite::Failed(reason) => assert!(reason.contains("403"), "{reason}"),
        other => panic!("expected a failed status write, got {other:?}"),
    }
}

#[tokio::test]
async fn unreadable_content_is_a_hard_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })))
        .mount(&server)
        .await;

    let err = orchestrator(&server)
        .publish(&ContentId::from("42"), [Platform::Telegram], &telegram_only())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::ContentUnavailable { ref id, .. } if id == "42"), "{err}");
    assert!(requests_to(&server, "/botTOKEN/sendMessage").await.is_empty());
}

#[tokio::test]
async fn server_errors_from_the_store_are_retried() {
    let server = MockServer::start().await;
    mount_send_message(&server).await;
    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "id": 42, "content": "<p>x</p>" } })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH")).and(path(ITEM_PATH)).respond_with(ResponseTemplate::new(204)).mount(&server).await;

    let report = orchestrator(&server)
        .publish(&ContentId::from("42"), [Platform::Telegram], &telegram_only())
        .await
        .unwrap();
    assert_eq!(report.status, StatusWrite::Recorded);
}

#[tokio::test]
async fn zero_retries_means_a_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let store = DirectusStore::builder()
        .base_url(server.uri())
        .token("T")
        .min_delay(Duration::from_millis(1))
        .max_retries(0)
        .build();
    assert!(store.fetch_content(&ContentId::from("42")).await.is_err());
    assert_eq!(requests_to(&server, ITEM_PATH).await.len(), 1);
}
