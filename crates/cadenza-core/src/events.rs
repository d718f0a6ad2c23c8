use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use cadenza_models::{ConversationId, MediaItem};

/// One playback outcome, reported to whatever reply surface the embedder
/// wires up (chat replies, HTTP push, logs).
#[derive(Debug, Clone)]
pub struct PlaybackEvent {
    pub conversation_id: ConversationId,
    pub at: DateTime<Utc>,
    pub kind: PlaybackEventKind,
}

#[derive(Debug, Clone)]
pub enum PlaybackEventKind {
    /// Item accepted into the backlog at the given 1-based position.
    Queued { item: MediaItem, position: usize },
    /// The engine confirmed this item is streaming.
    NowPlaying { item: MediaItem },
    /// The active item was skipped by an operator.
    Skipped { item: MediaItem },
    /// An item failed to start and was dropped without retry.
    ItemFailed { item: MediaItem, reason: String },
    /// Every remaining item failed during one advance cascade.
    QueueDrained { failures: usize },
    /// The live session was torn down.
    LeftCall,
    /// An operator stop completed; `cleared` backlog items were discarded.
    Stopped { cleared: usize },
}

/// Broadcast-based notification sink for playback outcomes.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlaybackEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, conversation_id: ConversationId, kind: PlaybackEventKind) {
        // Ignore error if no receivers
        let _ = self.sender.send(PlaybackEvent {
            conversation_id,
            at: Utc::now(),
            kind,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
