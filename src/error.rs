use crate::models::platform::Platform;

/// Boxed error used by every outbound API call.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Hard errors returned by `Orchestrator::publish`.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum PublishError {
    #[display("no platforms requested")]
    NoPlatforms,
    #[display("content {id} unavailable: {reason}")]
    ContentUnavailable { id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum CredentialError {
    #[display("{platform}: no credentials configured")]
    NotConfigured { platform: Platform },
    #[display("{platform}: missing credential field `{field}`")]
    MissingField { platform: Platform, field: &'static str },
    #[display("credentials for {found} supplied to the {expected} publisher")]
    PlatformMismatch { expected: Platform, found: Platform },
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum MediaError {
    #[display("failed to read {reference}: {reason}")]
    Read { reference: String, reason: String },
    #[display("no media host accepted {reference}: {reason}")]
    NoHostSucceeded { reference: String, reason: String },
}

/// Content store failure (HTTP, decoding or missing record).
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("content store: {message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_platform() {
        let err = CredentialError::MissingField { platform: Platform::Vk, field: "group_id" };
        assert_eq!(err.to_string(), "vk: missing credential field `group_id`");
        assert_eq!(PublishError::NoPlatforms.to_string(), "no platforms requested");
    }

    #[test]
    fn store_error_boxes() {
        let boxed: BoxError = StoreError::new("timeout").into();
        assert_eq!(boxed.to_string(), "content store: timeout");
    }
}
