pub mod content_store;
pub mod media_host;
pub mod publisher;

pub use content_store::ContentStore;
pub use media_host::MediaHost;
pub use publisher::{PlatformPublisher, PublishRequest};
