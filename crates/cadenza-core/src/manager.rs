use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use cadenza_models::{ConversationId, MediaItem};

use crate::engine::{EngineError, StreamEngine};
use crate::events::{EventBus, PlaybackEventKind};
use crate::queue::ConversationQueues;
use crate::session::{SessionPhase, SessionState};

/// What `skip` does when it empties the backlog. The userbot lineage
/// disagrees on this, so it stays a policy knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipExhaustPolicy {
    /// Tear the session down (canonical behavior).
    LeaveCall,
    /// Keep the current stream running; the skip becomes a no-op.
    StayInCall,
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub skip_exhaust: SkipExhaustPolicy,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            skip_exhaust: SkipExhaustPolicy::LeaveCall,
        }
    }
}

/// One item that failed to start and was dropped without retry.
#[derive(Debug, Clone)]
pub struct PlaybackFailure {
    pub item: MediaItem,
    pub error: EngineError,
}

/// Result of one advance: either something is streaming, or the
/// conversation ended up idle. `Drained` distinguishes "every remaining
/// item failed" from a normally exhausted backlog.
#[derive(Debug, Clone)]
pub enum AdvanceOutcome {
    /// `item` is streaming; `failures` lists items dropped on the way there.
    Started {
        item: MediaItem,
        failures: Vec<PlaybackFailure>,
    },
    /// Backlog empty. `left` is true when a live session was torn down.
    QueueEmpty { left: bool },
    /// The backlog drained entirely due to errors; the conversation is idle.
    Drained { failures: Vec<PlaybackFailure> },
}

#[derive(Debug, Clone)]
pub struct EnqueueReceipt {
    /// 1-based backlog position at insertion time.
    pub position: usize,
    /// Set when the enqueue found the conversation idle and kicked playback
    /// off itself.
    pub outcome: Option<AdvanceOutcome>,
}

#[derive(Debug, Clone)]
pub struct StopOutcome {
    /// Whether a live session existed (and was torn down).
    pub was_active: bool,
    /// Backlog items discarded by `clear_queue`.
    pub cleared: usize,
}

/// Snapshot of a conversation for display.
#[derive(Debug, Clone)]
pub struct QueueView {
    pub phase: SessionPhase,
    pub now_playing: Option<MediaItem>,
    pub pending: Vec<MediaItem>,
}

/// Orchestrates per-conversation backlogs and live sessions against the
/// engine. All mutating operations for one conversation serialize on that
/// conversation's lock, held across engine calls; conversations never block
/// each other.
pub struct QueueManager {
    engine: Arc<dyn StreamEngine>,
    queues: ConversationQueues,
    sessions: DashMap<ConversationId, Arc<Mutex<SessionState>>>,
    events: EventBus,
    config: PlaybackConfig,
}

impl QueueManager {
    pub fn new(engine: Arc<dyn StreamEngine>, config: PlaybackConfig) -> Self {
        Self {
            engine,
            queues: ConversationQueues::new(),
            sessions: DashMap::new(),
            events: EventBus::default(),
            config,
        }
    }

    /// The notification sink. Subscribe before issuing operations to
    /// observe their outcomes.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn session(&self, conversation_id: ConversationId) -> Arc<Mutex<SessionState>> {
        self.sessions
            .entry(conversation_id)
            .or_default()
            .clone()
    }

    /// Appends an item to the conversation's backlog. When the conversation
    /// is idle this also starts playback, and the receipt carries the
    /// advance outcome.
    pub async fn enqueue(&self, conversation_id: ConversationId, item: MediaItem) -> EnqueueReceipt {
        let session = self.session(conversation_id);
        let mut session = session.lock().await;

        let position = self.queues.enqueue(conversation_id, item.clone());
        debug!(conversation_id, position, title = %item.display_title(), "queued");
        self.events
            .publish(conversation_id, PlaybackEventKind::Queued { item, position });

        let outcome = if session.is_idle() {
            Some(self.advance_locked(conversation_id, &mut session).await)
        } else {
            None
        };
        EnqueueReceipt { position, outcome }
    }

    /// Retires the current item (if any) and activates the next queued one,
    /// or leaves the call when the backlog is empty.
    pub async fn advance(&self, conversation_id: ConversationId) -> AdvanceOutcome {
        let session = self.session(conversation_id);
        let mut session = session.lock().await;
        self.advance_locked(conversation_id, &mut session).await
    }

    /// Manual advance. The skipped item is not re-queued.
    pub async fn skip(&self, conversation_id: ConversationId) -> AdvanceOutcome {
        let session = self.session(conversation_id);
        let mut session = session.lock().await;

        if self.config.skip_exhaust == SkipExhaustPolicy::StayInCall
            && session.phase() == SessionPhase::Active
            && self.queues.is_empty(conversation_id)
        {
            return AdvanceOutcome::QueueEmpty { left: false };
        }

        if let Some(item) = session.active_item().cloned() {
            self.events
                .publish(conversation_id, PlaybackEventKind::Skipped { item });
        }
        self.advance_locked(conversation_id, &mut session).await
    }

    /// Forces the conversation idle. Leave failures are swallowed: the
    /// conversation is logically idle regardless.
    pub async fn stop(&self, conversation_id: ConversationId, clear_queue: bool) -> StopOutcome {
        let session = self.session(conversation_id);
        let mut session = session.lock().await;

        let cleared = if clear_queue {
            self.queues.clear(conversation_id)
        } else {
            0
        };
        let was_active = self.leave_locked(conversation_id, &mut session).await;
        self.events
            .publish(conversation_id, PlaybackEventKind::Stopped { cleared });
        StopOutcome { was_active, cleared }
    }

    /// Current playback snapshot: the active item plus the pending backlog.
    pub async fn list(&self, conversation_id: ConversationId) -> QueueView {
        let session = self.session(conversation_id);
        let session = session.lock().await;
        QueueView {
            phase: session.phase(),
            now_playing: session.active_item().cloned(),
            pending: self.queues.snapshot(conversation_id),
        }
    }

    /// Spawns the autoplay pump: consumes the engine's stream-end feed and
    /// advances the matching conversation. Each event is dispatched on its
    /// own task so a slow engine call for one conversation never stalls the
    /// feed for the others.
    pub fn spawn_stream_end_pump(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut ended = manager.engine.stream_ended();
        tokio::spawn(async move {
            loop {
                match ended.recv().await {
                    Ok(conversation_id) => {
                        debug!(conversation_id, "stream ended");
                        let manager = Arc::clone(&manager);
                        tokio::spawn(async move {
                            manager.advance(conversation_id).await;
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "stream-end feed lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Best-effort teardown of every live session, for process shutdown.
    pub async fn shutdown(&self) {
        let ids: Vec<ConversationId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for conversation_id in ids {
            self.stop(conversation_id, false).await;
        }
    }

    /// The core algorithm. Pops items until one starts or the backlog is
    /// exhausted; failed items are dropped and reported, never retried. The
    /// loop is bounded by the backlog length at entry — nothing can be
    /// appended while the conversation lock is held.
    async fn advance_locked(
        &self,
        conversation_id: ConversationId,
        session: &mut SessionState,
    ) -> AdvanceOutcome {
        let mut failures: Vec<PlaybackFailure> = Vec::new();
        let max_attempts = self.queues.len(conversation_id);

        for _ in 0..max_attempts {
            let Some(item) = self.queues.dequeue(conversation_id) else {
                break;
            };
            session.begin_join(item.clone());

            let result = if self.engine.has_active_session(conversation_id).await {
                self.engine.replace_active(conversation_id, &item).await
            } else {
                self.engine.join(conversation_id, &item).await
            };

            match result {
                Ok(()) => {
                    session.confirm_active();
                    info!(conversation_id, title = %item.display_title(), "now playing");
                    self.events.publish(
                        conversation_id,
                        PlaybackEventKind::NowPlaying { item: item.clone() },
                    );
                    return AdvanceOutcome::Started { item, failures };
                }
                Err(error) => {
                    session.fail_join();
                    warn!(
                        conversation_id,
                        title = %item.display_title(),
                        %error,
                        "stream start failed, dropping item"
                    );
                    self.events.publish(
                        conversation_id,
                        PlaybackEventKind::ItemFailed {
                            item: item.clone(),
                            reason: error.to_string(),
                        },
                    );
                    failures.push(PlaybackFailure { item, error });
                }
            }
        }

        // Nothing playable left.
        let left = self.leave_locked(conversation_id, session).await;
        if failures.is_empty() {
            AdvanceOutcome::QueueEmpty { left }
        } else {
            self.events.publish(
                conversation_id,
                PlaybackEventKind::QueueDrained {
                    failures: failures.len(),
                },
            );
            AdvanceOutcome::Drained { failures }
        }
    }

    /// Tears the live session down if one is up. Returns whether a teardown
    /// happened; a conversation with no engine session makes no leave call.
    ///
    /// The engine is consulted directly rather than trusting the state
    /// machine alone: a failed replace lands the phase back at `Idle` while
    /// the engine's call is still joined, and that call must come down too.
    async fn leave_locked(
        &self,
        conversation_id: ConversationId,
        session: &mut SessionState,
    ) -> bool {
        let engine_live = self.engine.has_active_session(conversation_id).await;
        if session.is_idle() && !engine_live {
            return false;
        }
        session.begin_leave();
        if engine_live {
            if let Err(error) = self.engine.leave(conversation_id).await {
                warn!(conversation_id, %error, "engine leave failed");
            }
        }
        session.finish_leave();
        self.events
            .publish(conversation_id, PlaybackEventKind::LeftCall);
        true
    }
}
