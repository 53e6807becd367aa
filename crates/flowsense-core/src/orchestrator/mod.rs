//! Session orchestration.
//!
//! [`SessionOrchestrator`] owns at most one live [`Session`](crate::Session)
//! and one [`FlowAnalyzer`](crate::FlowAnalyzer), applies the auto-pause,
//! break-reminder and flow-notification policies on each tick, and hands
//! snapshots to a [`SnapshotSink`](crate::storage::SnapshotSink).
//!
//! The orchestrator is synchronous. Time advances only through its
//! [`Clock`](crate::Clock); [`runtime::run`] drives it from a tokio event
//! loop.

mod engine;
pub mod runtime;
mod scheduler;

pub use engine::{FlowStats, SessionOrchestrator};
pub use runtime::HostCommand;
pub use scheduler::{Due, Scheduler};

use serde::{Deserialize, Serialize};

/// Timing and policy knobs, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    pub idle_timeout_ms: i64,
    pub tick_interval_ms: i64,
    pub autosave_interval_ms: i64,
    pub flow_detection_enabled: bool,
    pub flow_window_ms: i64,
    pub flow_notification_cooldown_ms: i64,
    pub break_reminders_enabled: bool,
    /// Session length after which a break is suggested.
    pub break_after_ms: i64,
    pub break_cooldown_ms: i64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 5 * 60_000,
            tick_interval_ms: 5_000,
            autosave_interval_ms: 30_000,
            flow_detection_enabled: true,
            flow_window_ms: crate::flow::DEFAULT_WINDOW_MS,
            flow_notification_cooldown_ms: 20 * 60_000,
            break_reminders_enabled: true,
            break_after_ms: 45 * 60_000,
            break_cooldown_ms: 30 * 60_000,
        }
    }
}
