use std::collections::VecDeque;

use dashmap::DashMap;

use cadenza_models::{ConversationId, MediaItem};

/// Per-conversation FIFO backlogs. A conversation with no entry is
/// indistinguishable from one with an empty backlog: entries are created on
/// first enqueue and removed again once drained.
///
/// This is a pure data structure; serialization of enqueue/advance against
/// engine transitions is the [`crate::manager::QueueManager`]'s job.
#[derive(Default)]
pub struct ConversationQueues {
    backlogs: DashMap<ConversationId, VecDeque<MediaItem>>,
}

impl ConversationQueues {
    pub fn new() -> Self {
        Self {
            backlogs: DashMap::new(),
        }
    }

    /// Appends `item` to the tail of the conversation's backlog and returns
    /// its 1-based position.
    pub fn enqueue(&self, conversation_id: ConversationId, item: MediaItem) -> usize {
        let mut backlog = self.backlogs.entry(conversation_id).or_default();
        backlog.push_back(item);
        backlog.len()
    }

    /// Removes and returns the head item, or `None` when the backlog is
    /// empty or absent.
    pub fn dequeue(&self, conversation_id: ConversationId) -> Option<MediaItem> {
        let mut backlog = self.backlogs.get_mut(&conversation_id)?;
        let item = backlog.pop_front();
        let drained = backlog.is_empty();
        drop(backlog);
        if drained {
            self.backlogs
                .remove_if(&conversation_id, |_, backlog| backlog.is_empty());
        }
        item
    }

    /// Read-only snapshot of the backlog in play order.
    pub fn snapshot(&self, conversation_id: ConversationId) -> Vec<MediaItem> {
        self.backlogs
            .get(&conversation_id)
            .map(|backlog| backlog.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self, conversation_id: ConversationId) -> bool {
        self.len(conversation_id) == 0
    }

    pub fn len(&self, conversation_id: ConversationId) -> usize {
        self.backlogs
            .get(&conversation_id)
            .map(|backlog| backlog.len())
            .unwrap_or(0)
    }

    /// Empties the backlog and returns how many items were removed.
    pub fn clear(&self, conversation_id: ConversationId) -> usize {
        self.backlogs
            .remove(&conversation_id)
            .map(|(_, backlog)| backlog.len())
            .unwrap_or(0)
    }
}
