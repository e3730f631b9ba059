#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crosspost::error::BoxError;
use crosspost::media::ImgurHost;
use crosspost::publishers::graph::GraphClient;
use crosspost::publishers::{FacebookPublisher, InstagramPublisher, TelegramPublisher, VkPublisher};
use crosspost::services::text_adapter::PlatformText;
use crosspost::traits::media_host::MediaHost;

pub const GRAPH_VERSION: &str = "v19.0";

/// In-process secondary host: counts uploads, optionally refuses them.
pub struct CountingHost {
    pub base_url: String,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl CountingHost {
    pub fn working() -> Arc<Self> {
        Arc::new(Self { base_url: "https://cdn.example.com".into(), fail: false, calls: AtomicUsize::new(0) })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self { base_url: String::new(), fail: true, calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaHost for CountingHost {
    fn name(&self) -> &str {
        "bucket"
    }

    async fn upload(&self, file_name: &str, _bytes: Vec<u8>) -> Result<String, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("bucket: access denied".into());
        }
        Ok(format!("{}/{}", self.base_url, file_name))
    }
}

pub fn imgur(server: &MockServer) -> Arc<ImgurHost> {
    Arc::new(ImgurHost::builder().client(Client::new()).base_url(server.uri()).client_id("cid").build())
}

pub async fn mount_imgur_failure(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/3/image"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(server)
        .await;
}

pub fn telegram(server: &MockServer) -> TelegramPublisher {
    TelegramPublisher::builder().client(Client::new()).base_url(server.uri()).build()
}

pub fn vk(server: &MockServer) -> VkPublisher {
    VkPublisher::builder().client(Client::new()).base_url(format!("{}/method", server.uri())).build()
}

pub fn graph(server: &MockServer) -> GraphClient {
    GraphClient::new(Client::new(), server.uri(), GRAPH_VERSION)
}

pub fn facebook(server: &MockServer) -> FacebookPublisher {
    FacebookPublisher::builder().graph(graph(server)).build()
}

pub fn instagram(server: &MockServer) -> InstagramPublisher {
    InstagramPublisher::builder()
        .graph(graph(server))
        .poll_attempts(3)
        .poll_interval(Duration::from_millis(10))
        .build()
}

pub fn text(s: &str) -> PlatformText {
    PlatformText::new(s.to_string())
}

/// `METHOD /path` of every request the server saw, in order.
pub async fn request_log(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}

pub async fn requests_to(server: &MockServer, request_path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == request_path)
        .collect()
}

/// Decoded `application/x-www-form-urlencoded` body.
pub fn form(req: &Request) -> HashMap<String, String> {
    url::form_urlencoded::parse(&req.body).into_owned().collect()
}

pub fn json_body(req: &Request) -> Value {
    serde_json::from_slice(&req.body).unwrap_or(Value::Null)
}
