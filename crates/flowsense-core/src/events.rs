use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionSnapshot;

/// Lifecycle operation a host asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Start,
    Pause,
    Resume,
    End,
}

/// Why a lifecycle request left state unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    AlreadyActive,
    AlreadyPaused,
    NotPaused,
    NoActiveSession,
}

/// Every observable state change of the orchestrator produces an event.
/// Presentation layers subscribe to these; none of them carry display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: String,
        at: DateTime<Utc>,
    },
    Paused {
        at: DateTime<Utc>,
    },
    Resumed {
        at: DateTime<Utc>,
    },
    Ended {
        snapshot: Box<SessionSnapshot>,
    },
    /// Paused after exceeding the idle timeout.
    AutoPaused {
        idle_minutes: u64,
        at: DateTime<Utc>,
    },
    /// Resumed because activity arrived while paused.
    AutoResumed {
        at: DateTime<Utc>,
    },
    BreakSuggested {
        duration_ms: i64,
        at: DateTime<Utc>,
    },
    FlowEntered {
        duration_ms: i64,
        at: DateTime<Utc>,
    },
    /// A flow period closed; `duration_ms` is its last known length.
    FlowExited {
        duration_ms: i64,
        at: DateTime<Utc>,
    },
    TransitionRejected {
        attempted: Transition,
        reason: RejectReason,
    },
    PersistFailed {
        /// True for the terminal write at `end()`.
        final_write: bool,
        message: String,
    },
}

impl SessionEvent {
    /// Stable snake_case name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Started { .. } => "started",
            SessionEvent::Paused { .. } => "paused",
            SessionEvent::Resumed { .. } => "resumed",
            SessionEvent::Ended { .. } => "ended",
            SessionEvent::AutoPaused { .. } => "auto_paused",
            SessionEvent::AutoResumed { .. } => "auto_resumed",
            SessionEvent::BreakSuggested { .. } => "break_suggested",
            SessionEvent::FlowEntered { .. } => "flow_entered",
            SessionEvent::FlowExited { .. } => "flow_exited",
            SessionEvent::TransitionRejected { .. } => "transition_rejected",
            SessionEvent::PersistFailed { .. } => "persist_failed",
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SessionEvent::TransitionRejected { .. } | SessionEvent::PersistFailed { .. }
        )
    }
}
