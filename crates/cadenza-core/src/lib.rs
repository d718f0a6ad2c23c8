pub mod auth;
pub mod engine;
pub mod events;
pub mod manager;
pub mod queue;
pub mod session;
pub mod sim;

pub use auth::{QueueAuthorizer, SudoAuthorizer};
pub use engine::{EngineError, StreamEngine};
pub use events::{EventBus, PlaybackEvent, PlaybackEventKind};
pub use manager::{
    AdvanceOutcome, EnqueueReceipt, PlaybackConfig, PlaybackFailure, QueueManager, QueueView,
    SkipExhaustPolicy, StopOutcome,
};
pub use queue::ConversationQueues;
pub use session::{SessionPhase, SessionState};
pub use sim::SimulatedEngine;
