pub mod config;
pub mod content;
pub mod credentials;
pub mod platform;
pub mod publication;
pub mod types;

pub use content::ContentItem;
pub use credentials::{CredentialSet, PlatformCredentials};
pub use platform::{Platform, PublicationShape};
pub use publication::{PublicationResult, PublicationStatus, PublishReport, PublishedPost, StatusWrite};
pub use types::{ContentId, ImageRef};
