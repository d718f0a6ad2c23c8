use std::collections::HashSet;

use async_trait::async_trait;

use cadenza_models::ConversationId;

/// Whether a user may mutate a conversation's queue. The core never stores
/// permissions itself; the surface layer consults this before calling in.
#[async_trait]
pub trait QueueAuthorizer: Send + Sync {
    async fn can_control(&self, user_id: i64, conversation_id: ConversationId) -> bool;
}

/// Fixed allow-list of operator user ids, the userbot "sudo users" model.
pub struct SudoAuthorizer {
    sudo_users: HashSet<i64>,
}

impl SudoAuthorizer {
    pub fn new(sudo_users: impl IntoIterator<Item = i64>) -> Self {
        Self {
            sudo_users: sudo_users.into_iter().collect(),
        }
    }
}

#[async_trait]
impl QueueAuthorizer for SudoAuthorizer {
    async fn can_control(&self, user_id: i64, _conversation_id: ConversationId) -> bool {
        self.sudo_users.contains(&user_id)
    }
}
