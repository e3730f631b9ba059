use std::time::Duration;

use reqwest::Client;

use crate::error::BoxError;

pub const ELLIPSIS: &str = "...";

/// Trim text to at most `max_chars` characters, ending with `...` if trimmed.
/// Uses char-aware slicing to avoid breaking UTF-8 sequences.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= ELLIPSIS.len() {
        return ELLIPSIS.chars().take(max_chars).collect();
    }
    let mut s: String = text.chars().take(max_chars - ELLIPSIS.len()).collect();
    s.push_str(ELLIPSIS);
    s
}

/// HTTP client with a per-request timeout.
pub fn http_client(timeout_secs: u64) -> Result<Client, BoxError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("crosspost/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Short body preview for logs and error messages.
pub fn preview(body: &str) -> String {
    truncate_with_ellipsis(body.trim(), 300)
}
