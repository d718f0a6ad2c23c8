use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use cadenza_models::{ConversationId, MediaItem};

use crate::engine::{EngineError, StreamEngine};

/// In-process stand-in for a real group-call engine, for development and
/// end-to-end tests. Every join/replace arms a timer task; when the
/// simulated track length elapses it emits the conversation id on the
/// stream-end feed. The session entry stays in the map after the timer
/// fires — a real call stays joined after its stream ends, until `leave`.
pub struct SimulatedEngine {
    track_length: Duration,
    active: DashMap<ConversationId, JoinHandle<()>>,
    ended: broadcast::Sender<ConversationId>,
}

impl SimulatedEngine {
    pub fn new(track_length: Duration) -> Self {
        let (ended, _) = broadcast::channel(256);
        Self {
            track_length,
            active: DashMap::new(),
            ended,
        }
    }

    fn arm_timer(&self, conversation_id: ConversationId) {
        let ended = self.ended.clone();
        let track_length = self.track_length;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(track_length).await;
            // Ignore error if nobody is pumping the feed.
            let _ = ended.send(conversation_id);
        });
        if let Some(previous) = self.active.insert(conversation_id, handle) {
            previous.abort();
        }
    }
}

#[async_trait]
impl StreamEngine for SimulatedEngine {
    async fn has_active_session(&self, conversation_id: ConversationId) -> bool {
        self.active.contains_key(&conversation_id)
    }

    async fn join(
        &self,
        conversation_id: ConversationId,
        item: &MediaItem,
    ) -> Result<(), EngineError> {
        if self.active.contains_key(&conversation_id) {
            return Err(EngineError::Join(format!(
                "conversation {conversation_id} already has a session"
            )));
        }
        debug!(conversation_id, title = %item.display_title(), "simulated join");
        self.arm_timer(conversation_id);
        Ok(())
    }

    async fn replace_active(
        &self,
        conversation_id: ConversationId,
        item: &MediaItem,
    ) -> Result<(), EngineError> {
        if !self.active.contains_key(&conversation_id) {
            return Err(EngineError::Replace(format!(
                "no active session for conversation {conversation_id}"
            )));
        }
        debug!(conversation_id, title = %item.display_title(), "simulated replace");
        self.arm_timer(conversation_id);
        Ok(())
    }

    async fn leave(&self, conversation_id: ConversationId) -> Result<(), EngineError> {
        if let Some((_, handle)) = self.active.remove(&conversation_id) {
            handle.abort();
            debug!(conversation_id, "simulated leave");
        }
        Ok(())
    }

    fn stream_ended(&self) -> broadcast::Receiver<ConversationId> {
        self.ended.subscribe()
    }
}
