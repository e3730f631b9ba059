pub mod directus;
pub mod media_resolver;
pub mod orchestrator;
pub mod settings;
pub mod status_reporter;
pub mod text_adapter;

pub use directus::DirectusStore;
pub use media_resolver::{MediaResolver, ResolvedMedia};
pub use orchestrator::Orchestrator;
pub use status_reporter::StatusReporter;
