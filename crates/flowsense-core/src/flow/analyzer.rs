//! Sliding-window flow-state analysis.
//!
//! The analyzer keeps two bounded buffers (typing patterns and file
//! changes) and recomputes every score from scratch on each call, so an
//! analysis costs O(buffer size) and never depends on earlier results.

use tracing::debug;

use super::buffer::{BoundedBuffer, FileChange, TypingPattern};
use super::metrics::{FlowMetrics, Insight, FLOW_THRESHOLD};
use crate::clock::{Clock, SystemClock};

pub const MAX_TYPING_PATTERNS: usize = 1000;
pub const MAX_FILE_CHANGES: usize = 50;

/// Default trailing window: 10 minutes.
pub const DEFAULT_WINDOW_MS: i64 = 600_000;

/// Fewer windowed patterns than this yields the neutral metric set.
const MIN_PATTERNS: usize = 10;
const MIN_RHYTHM_KEYSTROKES: usize = 5;
const MIN_ERROR_KEYSTROKES: usize = 20;

const FOCUS_SLOTS: usize = 20;

/// Inter-arrival below this counts toward a rapid-correction burst.
const BURST_INTERVAL_MS: i64 = 100;
const BURST_MIN_RUN: usize = 3;
/// One burst per this many keystrokes drives error quality to zero.
const KEYSTROKES_PER_BURST: f64 = 50.0;

/// A gap longer than this ends a continuous activity run.
const FLOW_GAP_MS: i64 = 30_000;

#[derive(Debug, Clone)]
pub struct FlowAnalyzer<C: Clock = SystemClock> {
    clock: C,
    typing_patterns: BoundedBuffer<TypingPattern>,
    file_changes: BoundedBuffer<FileChange>,
}

impl<C: Clock> FlowAnalyzer<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            typing_patterns: BoundedBuffer::new(MAX_TYPING_PATTERNS),
            file_changes: BoundedBuffer::new(MAX_FILE_CHANGES),
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.typing_patterns.len()
    }

    pub fn file_change_count(&self) -> usize {
        self.file_changes.len()
    }

    /// Record a keystroke and, if the file differs from the last recorded
    /// file change, a new file change.
    pub fn record_keystroke(&mut self, file: Option<&str>) {
        let now = self.clock.now_ms();
        self.typing_patterns.push(TypingPattern {
            timestamp_ms: now,
            is_keystroke: true,
            file: file.map(str::to_string),
        });

        if let Some(file) = file {
            let changed = self
                .file_changes
                .last()
                .map_or(true, |last| last.file != file);
            if changed {
                self.file_changes.push(FileChange {
                    timestamp_ms: now,
                    file: file.to_string(),
                });
            }
        }
    }

    /// Mark a gap in activity. Does not count as a keystroke.
    pub fn record_inactivity(&mut self) {
        self.typing_patterns.push(TypingPattern {
            timestamp_ms: self.clock.now_ms(),
            is_keystroke: false,
            file: None,
        });
    }

    pub fn reset(&mut self) {
        self.typing_patterns.clear();
        self.file_changes.clear();
    }

    /// Score the trailing `window_ms` of buffered events.
    pub fn analyze_current_flow_state(&self, window_ms: i64) -> FlowMetrics {
        let window_ms = window_ms.max(1);
        let now = self.clock.now_ms();
        let from = now - window_ms;

        let patterns: Vec<&TypingPattern> = self.typing_patterns.within(from, now).collect();
        if patterns.len() < MIN_PATTERNS {
            debug!(
                patterns = patterns.len(),
                window_ms, "too few samples for flow analysis"
            );
            return FlowMetrics::insufficient_data();
        }

        let keystrokes: Vec<i64> = patterns
            .iter()
            .filter(|p| p.is_keystroke)
            .map(|p| p.timestamp_ms)
            .collect();
        let changes = self.file_changes.within(from, now).count();

        let typing_rhythm = typing_rhythm(&keystrokes);
        let focus_consistency = focus_consistency(&keystrokes, from, window_ms);
        let context_switching = context_switching(changes, window_ms);
        let error_rate = error_quality(&keystrokes);
        let flow_probability =
            FlowMetrics::combine(typing_rhythm, focus_consistency, context_switching, error_rate);
        let flow_duration = if flow_probability > FLOW_THRESHOLD {
            longest_active_run(&keystrokes)
        } else {
            0
        };

        let metrics = FlowMetrics {
            typing_rhythm,
            focus_consistency,
            context_switching,
            error_rate,
            flow_probability,
            flow_duration,
        };
        debug!(
            keystrokes = keystrokes.len(),
            file_changes = changes,
            probability = metrics.flow_probability,
            flow_duration_ms = metrics.flow_duration,
            "flow analysis"
        );
        metrics
    }

    pub fn is_in_flow_state(&self, window_ms: i64) -> bool {
        self.analyze_current_flow_state(window_ms).is_flow()
    }

    /// Advisories for the default window.
    pub fn get_flow_state_insights(&self) -> Vec<Insight> {
        Insight::from_metrics(&self.analyze_current_flow_state(DEFAULT_WINDOW_MS))
    }
}

fn intervals(timestamps: &[i64]) -> impl Iterator<Item = i64> + '_ {
    timestamps.windows(2).map(|pair| pair[1] - pair[0])
}

/// 1 - coefficient of variation of inter-keystroke intervals.
fn typing_rhythm(keystrokes: &[i64]) -> f64 {
    if keystrokes.len() < MIN_RHYTHM_KEYSTROKES {
        return 0.0;
    }
    let gaps: Vec<f64> = intervals(keystrokes).map(|g| g as f64).collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
}

/// Evenness of keystrokes across equal time slots of the window.
fn focus_consistency(keystrokes: &[i64], window_start_ms: i64, window_ms: i64) -> f64 {
    if keystrokes.is_empty() {
        return 0.0;
    }
    let slot_ms = window_ms as f64 / FOCUS_SLOTS as f64;
    let mut counts = [0u32; FOCUS_SLOTS];
    for &ts in keystrokes {
        let slot = ((ts - window_start_ms) as f64 / slot_ms).floor().max(0.0) as usize;
        counts[slot.min(FOCUS_SLOTS - 1)] += 1;
    }

    let total = keystrokes.len() as f64;
    let mean = total / FOCUS_SLOTS as f64;
    let variance = counts
        .iter()
        .map(|&c| (c as f64 - mean).powi(2))
        .sum::<f64>()
        / FOCUS_SLOTS as f64;
    (1.0 - variance / (total * total)).clamp(0.0, 1.0)
}

/// Fewer file switches per minute score higher.
///
/// Up to 1 switch/min scores 1, falling linearly to 0.5 at 2/min and to 0
/// at 4/min.
fn context_switching(file_changes: usize, window_ms: i64) -> f64 {
    if file_changes <= 1 {
        return 1.0;
    }
    let window_min = window_ms as f64 / 60_000.0;
    let per_min = (file_changes - 1) as f64 / window_min;
    let score = if per_min <= 1.0 {
        1.0
    } else if per_min <= 2.0 {
        1.0 - 0.5 * (per_min - 1.0)
    } else {
        0.5 - 0.25 * (per_min - 2.0)
    };
    score.clamp(0.0, 1.0)
}

/// Quality score from rapid-correction bursts: runs of at least three
/// keystrokes with every gap under 100 ms.
fn error_quality(keystrokes: &[i64]) -> f64 {
    if keystrokes.len() < MIN_ERROR_KEYSTROKES {
        return 0.5;
    }
    let mut bursts = 0usize;
    let mut run = 1usize;
    for gap in intervals(keystrokes) {
        if gap < BURST_INTERVAL_MS {
            run += 1;
        } else {
            if run >= BURST_MIN_RUN {
                bursts += 1;
            }
            run = 1;
        }
    }
    if run >= BURST_MIN_RUN {
        bursts += 1;
    }

    let expected = keystrokes.len() as f64 / KEYSTROKES_PER_BURST;
    (1.0 - (bursts as f64 / expected).min(1.0)).clamp(0.0, 1.0)
}

/// Longest span of keystrokes whose consecutive gaps never exceed 30 s.
fn longest_active_run(keystrokes: &[i64]) -> i64 {
    let Some(&first) = keystrokes.first() else {
        return 0;
    };
    let mut run_start = first;
    let mut prev = first;
    let mut longest = 0;
    for &ts in &keystrokes[1..] {
        if ts - prev > FLOW_GAP_MS {
            longest = longest.max(prev - run_start);
            run_start = ts;
        }
        prev = ts;
    }
    longest.max(prev - run_start)
}
