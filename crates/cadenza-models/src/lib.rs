pub mod media;

pub use media::{ConversationId, MediaItem, MediaKind, MediaSource};
