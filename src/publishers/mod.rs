pub mod facebook;
pub mod graph;
pub mod instagram;
pub mod ladder;
pub mod telegram;
pub mod utils;
pub mod vk;

pub use facebook::FacebookPublisher;
pub use instagram::InstagramPublisher;
pub use telegram::TelegramPublisher;
pub use vk::VkPublisher;
pub use crate::traits::publisher::PlatformPublisher;
