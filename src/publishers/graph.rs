use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::BoxError;
use crate::publishers::utils::preview;

/// Thin Graph API client shared by the Facebook and Instagram publishers.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
    version: String,
}

impl GraphClient {
    pub fn new(client: Client, base_url: impl Into<String>, version: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            version: version.into().trim_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.version, path.trim_start_matches('/'))
    }

    /// Form-encoded POST.
    pub async fn post(&self, path: &str, params: &[(&str, String)]) -> Result<Value, BoxError> {
        let url = self.url(path);
        debug!(url = %url, fields = params.len(), "graph: POST");
        let res = self.client.post(&url).form(params).send().await?;
        read_response(path, res).await
    }

    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, BoxError> {
        let url = self.url(path);
        debug!(url = %url, "graph: GET");
        let res = self.client.get(&url).query(params).send().await?;
        read_response(path, res).await
    }
}

async fn read_response(path: &str, res: Response) -> Result<Value, BoxError> {
    let code = res.status();
    let text = res.text().await.unwrap_or_default();
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    if let Some(err) = body.get("error") {
        let message = err.get("message").and_then(Value::as_str).unwrap_or("unknown error");
        let err_code = err.get("code").map(|c| c.to_string()).unwrap_or_default();
        error!(path = %path, status = %code, code = %err_code, message = %message, "graph: API error");
        return Err(format!("graph {}: {} (code {})", path, message, err_code).into());
    }
    if !code.is_success() {
        error!(path = %path, status = %code, body = %preview(&text), "graph: HTTP error");
        return Err(format!("graph {}: HTTP {}", path, code).into());
    }
    if body.is_null() {
        return Err(format!("graph {}: malformed response: {}", path, preview(&text)).into());
    }
    Ok(body)
}

/// `id` field as a string, whether the API sent a string or a number.
pub fn id_of(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn require_id(body: &Value, key: &str, what: &str) -> Result<String, BoxError> {
    id_of(body, key).ok_or_else(|| format!("{} response has no {}", what, key).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_joins_version_and_path() {
        let g = GraphClient::new(Client::new(), "https://graph.facebook.com/", "v19.0");
        assert_eq!(g.url("/123/feed"), "https://graph.facebook.com/v19.0/123/feed");
    }

    #[test]
    fn ids_may_be_numbers() {
        assert_eq!(id_of(&json!({"id": 17}), "id").as_deref(), Some("17"));
        assert_eq!(id_of(&json!({"id": "a_b"}), "id").as_deref(), Some("a_b"));
        assert_eq!(id_of(&json!({"id": ""}), "id"), None);
        assert!(require_id(&json!({}), "post_id", "feed").is_err());
    }
}
