use cadenza_models::MediaItem;

/// Where a conversation's live session currently stands.
///
/// `Idle` is the rest state between tracks and at startup. `Joining` and
/// `Leaving` only exist while a transition is in flight, which is always
/// under the manager's per-conversation lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Joining,
    Active,
    Leaving,
}

/// Per-conversation session state. Owned and mutated exclusively by the
/// [`crate::manager::QueueManager`] under its per-conversation lock.
///
/// Invariant: `active_item` is set if and only if the phase is `Joining` or
/// `Active`.
#[derive(Debug)]
pub struct SessionState {
    phase: SessionPhase,
    active_item: Option<MediaItem>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            active_item: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn active_item(&self) -> Option<&MediaItem> {
        self.active_item.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SessionPhase::Idle
    }

    /// A join or replace is going out for `item`.
    pub fn begin_join(&mut self, item: MediaItem) {
        debug_assert!(matches!(
            self.phase,
            SessionPhase::Idle | SessionPhase::Active
        ));
        self.phase = SessionPhase::Joining;
        self.active_item = Some(item);
    }

    /// The engine confirmed the stream is up.
    pub fn confirm_active(&mut self) {
        debug_assert_eq!(self.phase, SessionPhase::Joining);
        debug_assert!(self.active_item.is_some());
        self.phase = SessionPhase::Active;
    }

    /// The in-flight join/replace failed. Drops the pending item and
    /// returns it so the caller can report it.
    pub fn fail_join(&mut self) -> Option<MediaItem> {
        debug_assert_eq!(self.phase, SessionPhase::Joining);
        self.phase = SessionPhase::Idle;
        self.active_item.take()
    }

    /// Teardown is going out. Clears the active item up front so the
    /// invariant holds while the engine call is in flight.
    pub fn begin_leave(&mut self) {
        self.phase = SessionPhase::Leaving;
        self.active_item = None;
    }

    /// Teardown finished (successfully or not, the conversation is
    /// logically idle either way).
    pub fn finish_leave(&mut self) {
        debug_assert_eq!(self.phase, SessionPhase::Leaving);
        self.phase = SessionPhase::Idle;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_models::{MediaKind, MediaSource};

    fn item() -> MediaItem {
        MediaItem::new(MediaKind::Audio, MediaSource::RemoteUrl("u".into()))
    }

    #[test]
    fn starts_idle_with_no_item() {
        let state = SessionState::new();
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(state.active_item().is_none());
    }

    #[test]
    fn join_confirm_cycle() {
        let mut state = SessionState::new();
        state.begin_join(item());
        assert_eq!(state.phase(), SessionPhase::Joining);
        assert!(state.active_item().is_some());
        state.confirm_active();
        assert_eq!(state.phase(), SessionPhase::Active);
        assert!(state.active_item().is_some());
    }

    #[test]
    fn failed_join_returns_to_idle_and_yields_item() {
        let mut state = SessionState::new();
        state.begin_join(item());
        let dropped = state.fail_join();
        assert!(dropped.is_some());
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(state.active_item().is_none());
    }

    #[test]
    fn leave_clears_item_before_completion() {
        let mut state = SessionState::new();
        state.begin_join(item());
        state.confirm_active();
        state.begin_leave();
        assert_eq!(state.phase(), SessionPhase::Leaving);
        assert!(state.active_item().is_none());
        state.finish_leave();
        assert_eq!(state.phase(), SessionPhase::Idle);
    }

    #[test]
    fn replace_goes_through_joining_again() {
        let mut state = SessionState::new();
        state.begin_join(item());
        state.confirm_active();
        // Next track over the same session.
        state.begin_join(item());
        assert_eq!(state.phase(), SessionPhase::Joining);
        state.confirm_active();
        assert_eq!(state.phase(), SessionPhase::Active);
    }
}
