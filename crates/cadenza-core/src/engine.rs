use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use cadenza_models::{ConversationId, MediaItem};

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("join failed: {0}")]
    Join(String),
    #[error("replace failed: {0}")]
    Replace(String),
    #[error("leave failed: {0}")]
    Leave(String),
}

/// Narrow boundary to the live-call engine. The manager is the only caller;
/// a production deployment implements this against a real group-call
/// transport, [`crate::sim::SimulatedEngine`] stands in elsewhere.
#[async_trait]
pub trait StreamEngine: Send + Sync {
    /// Whether the engine currently holds a session for the conversation.
    /// A session stays up after its stream ends, until `leave`.
    async fn has_active_session(&self, conversation_id: ConversationId) -> bool;

    /// Starts a new live session playing `item`. Fails when a session
    /// already exists; callers check `has_active_session` first.
    async fn join(
        &self,
        conversation_id: ConversationId,
        item: &MediaItem,
    ) -> Result<(), EngineError>;

    /// Swaps the streaming item without leaving the session. Fails when no
    /// session exists.
    async fn replace_active(
        &self,
        conversation_id: ConversationId,
        item: &MediaItem,
    ) -> Result<(), EngineError>;

    /// Terminates the session. Idempotent: leaving a conversation with no
    /// session is a no-op success.
    async fn leave(&self, conversation_id: ConversationId) -> Result<(), EngineError>;

    /// Subscription to the engine's stream-end feed: one conversation id
    /// per completed playback, delivered out-of-band.
    fn stream_ended(&self) -> broadcast::Receiver<ConversationId>;
}
