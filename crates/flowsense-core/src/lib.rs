//! # FlowSense Core Library
//!
//! Core logic for tracking coding sessions and estimating whether the
//! developer is in a flow state. Hosts (the `flowsense` CLI, an editor
//! extension) feed activity in and subscribe to [`SessionEvent`]s; all
//! display text lives in the host.
//!
//! ## Architecture
//!
//! - **Session**: one coding session's lifecycle and counters, timed by an
//!   injectable [`Clock`]
//! - **Flow**: bounded activity buffers and heuristic scoring of rhythm,
//!   focus, file switching and correction bursts
//! - **Orchestrator**: idle auto-pause, break reminders, flow notifications,
//!   periodic autosave
//! - **Storage**: SQLite snapshot store and TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionOrchestrator`]: owns the live session and its policies
//! - [`FlowAnalyzer`]: scores recent activity into [`FlowMetrics`]
//! - [`Database`]: snapshot persistence and aggregate statistics
//! - [`Config`]: user configuration

pub mod clock;
pub mod error;
pub mod events;
pub mod flow;
pub mod orchestrator;
pub mod session;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, OrchestratorError, StoreError};
pub use events::{RejectReason, SessionEvent, Transition};
pub use flow::{FlowAnalyzer, FlowMetrics, Insight};
pub use orchestrator::{FlowStats, HostCommand, OrchestratorSettings, SessionOrchestrator};
pub use session::{Session, SessionSnapshot, SessionState};
pub use storage::{Config, Database, MemorySink, SnapshotSink, Stats};
