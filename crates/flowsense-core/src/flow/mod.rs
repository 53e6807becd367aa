//! Flow-state analytics.
//!
//! Heuristic scoring over a trailing time window of buffered keystrokes
//! and file changes. Thresholds and weights are fixed; see [`metrics`].

mod analyzer;
mod buffer;
pub mod metrics;

pub use analyzer::{FlowAnalyzer, DEFAULT_WINDOW_MS, MAX_FILE_CHANGES, MAX_TYPING_PATTERNS};
pub use buffer::{BoundedBuffer, FileChange, Timestamped, TypingPattern};
pub use metrics::{FlowMetrics, Insight, FLOW_THRESHOLD};
