//! Coding session state machine.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Active <-> Paused
//!           |          |
//!           +-> Ended <+   (end() from Paused resumes first)
//! ```
//!
//! Durations are integer milliseconds, always computed from the session's
//! own [`Clock`] so that `duration` can never go negative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::snapshot::SessionSnapshot;
use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SessionState {
    /// Created but not started.
    Idle,
    Active,
    Paused {
        since: DateTime<Utc>,
    },
    /// Terminal. A session is never reused after this.
    Ended,
}

impl SessionState {
    /// Active or paused; paused implies active.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active | SessionState::Paused { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, SessionState::Paused { .. })
    }

    /// Accepting activity: active and not paused.
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}

/// A single coding session.
#[derive(Debug, Clone)]
pub struct Session<C: Clock = SystemClock> {
    id: String,
    clock: C,
    state: SessionState,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    /// Closed pause intervals only; an open pause is added on resume.
    paused_duration_ms: i64,
    last_activity_time: DateTime<Utc>,
    files_worked_on: Vec<String>,
    keystrokes: u64,
    flow_state_detected: bool,
    flow_state_duration_ms: i64,
    interruptions: u32,
}

impl<C: Clock> Session<C> {
    /// Create an idle session with a fresh id.
    pub fn new(clock: C) -> Self {
        let now = clock.now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            clock,
            state: SessionState::Idle,
            start_time: now,
            end_time: None,
            paused_duration_ms: 0,
            last_activity_time: now,
            files_worked_on: Vec::new(),
            keystrokes: 0,
            flow_state_detected: false,
            flow_state_duration_ms: 0,
            interruptions: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn keystrokes(&self) -> u64 {
        self.keystrokes
    }

    pub fn files_worked_on(&self) -> &[String] {
        &self.files_worked_on
    }

    pub fn flow_state_detected(&self) -> bool {
        self.flow_state_detected
    }

    pub fn interruptions(&self) -> u32 {
        self.interruptions
    }

    /// Cumulative paused time, including a pause still in progress.
    pub fn paused_duration_ms(&self) -> i64 {
        let open = match self.state {
            SessionState::Paused { since } => (self.clock.now() - since).num_milliseconds().max(0),
            _ => 0,
        };
        self.paused_duration_ms + open
    }

    /// Elapsed time since start minus paused time, in `[0, elapsed]`.
    pub fn duration_ms(&self) -> i64 {
        if self.state == SessionState::Idle {
            return 0;
        }
        let end = self.end_time.unwrap_or_else(|| self.clock.now());
        let elapsed = (end - self.start_time).num_milliseconds().max(0);
        (elapsed - self.paused_duration_ms()).clamp(0, elapsed)
    }

    /// Milliseconds since the last accepted activity.
    pub fn idle_ms(&self) -> i64 {
        (self.clock.now() - self.last_activity_time)
            .num_milliseconds()
            .max(0)
    }

    /// True iff running and idle for strictly longer than `idle_timeout_ms`.
    pub fn should_auto_pause(&self, idle_timeout_ms: i64) -> bool {
        self.state.is_running() && self.idle_ms() > idle_timeout_ms
    }

    /// Fully recomputed copy of every observable field.
    pub fn snapshot(&self) -> SessionSnapshot {
        let duration = self.duration_ms();
        SessionSnapshot {
            id: self.id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration,
            is_active: self.state.is_active(),
            is_paused: self.state.is_paused(),
            paused_duration: self.paused_duration_ms(),
            files_worked_on: self.files_worked_on.clone(),
            keystrokes: self.keystrokes,
            active_time: duration,
            flow_state_detected: self.flow_state_detected,
            flow_state_duration: self.flow_state_duration_ms,
            interruptions: self.interruptions,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Idle -> Active. Returns whether the transition happened.
    pub fn start(&mut self) -> bool {
        match self.state {
            SessionState::Idle => {
                let now = self.clock.now();
                self.state = SessionState::Active;
                self.start_time = now;
                self.last_activity_time = now;
                debug!(session_id = %self.id, "session started");
                true
            }
            SessionState::Active | SessionState::Paused { .. } | SessionState::Ended => false,
        }
    }

    pub fn pause(&mut self) -> bool {
        match self.state {
            SessionState::Active => {
                self.state = SessionState::Paused {
                    since: self.clock.now(),
                };
                true
            }
            SessionState::Idle | SessionState::Paused { .. } | SessionState::Ended => false,
        }
    }

    pub fn resume(&mut self) -> bool {
        match self.state {
            SessionState::Paused { since } => {
                let now = self.clock.now();
                self.paused_duration_ms += (now - since).num_milliseconds().max(0);
                self.state = SessionState::Active;
                self.last_activity_time = now;
                true
            }
            SessionState::Idle | SessionState::Active | SessionState::Ended => false,
        }
    }

    /// Finalize the session. A paused session is resumed first so the last
    /// pause interval is accounted for.
    pub fn end(&mut self) -> bool {
        match self.state {
            SessionState::Active | SessionState::Paused { .. } => {
                self.resume();
                self.state = SessionState::Ended;
                self.end_time = Some(self.clock.now());
                debug!(
                    session_id = %self.id,
                    duration_ms = self.duration_ms(),
                    "session ended"
                );
                true
            }
            SessionState::Idle | SessionState::Ended => false,
        }
    }

    /// Count one activity event. Ignored unless running.
    pub fn record_activity(&mut self, file: Option<&str>) -> bool {
        if !self.state.is_running() {
            return false;
        }
        self.last_activity_time = self.clock.now();
        self.keystrokes += 1;
        if let Some(file) = file {
            if !self.files_worked_on.iter().any(|f| f == file) {
                self.files_worked_on.push(file.to_string());
            }
        }
        true
    }

    // ── Orchestrator-maintained fields ───────────────────────────────

    pub(crate) fn set_flow_state(&mut self, detected: bool) {
        self.flow_state_detected = detected;
    }

    pub(crate) fn set_flow_state_duration(&mut self, duration_ms: i64) {
        self.flow_state_duration_ms = duration_ms.max(0);
    }

    pub(crate) fn record_interruption(&mut self) {
        self.interruptions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
    }

    #[test]
    fn start_pause_resume_end() {
        let clock = clock();
        let mut session = Session::new(clock.clone());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_active());

        assert!(session.start());
        assert_eq!(session.state(), SessionState::Active);
        assert!(!session.start());

        assert!(session.pause());
        assert!(session.is_paused() && session.is_active());
        assert!(!session.pause());

        assert!(session.resume());
        assert!(!session.resume());

        assert!(session.end());
        assert_eq!(session.state(), SessionState::Ended);
        assert!(!session.end());
        assert!(!session.start());
    }

    #[test]
    fn idle_session_rejects_pause_and_end() {
        let mut session = Session::new(clock());
        assert!(!session.pause());
        assert!(!session.resume());
        assert!(!session.end());
        assert_eq!(session.duration_ms(), 0);
    }

    #[test]
    fn pause_interval_is_excluded_from_duration() {
        let clock = clock();
        let mut session = Session::new(clock.clone());
        session.start();
        clock.advance_ms(10_000);
        session.pause();
        clock.advance_ms(5_000);
        session.resume();
        clock.advance_ms(2_000);

        let snap = session.snapshot();
        assert_eq!(snap.paused_duration, 5_000);
        assert_eq!(snap.duration, 12_000);
        assert_eq!(snap.active_time, snap.duration);
    }

    #[test]
    fn open_pause_does_not_count_as_active_time() {
        let clock = clock();
        let mut session = Session::new(clock.clone());
        session.start();
        clock.advance_ms(3_000);
        session.pause();
        clock.advance_ms(60_000);
        assert_eq!(session.duration_ms(), 3_000);
    }

    #[test]
    fn end_while_paused_resumes_first() {
        let clock = clock();
        let mut session = Session::new(clock.clone());
        session.start();
        clock.advance_ms(1_000);
        session.pause();
        clock.advance_ms(4_000);
        assert!(session.end());

        let snap = session.snapshot();
        assert!(!snap.is_paused);
        assert!(!snap.is_active);
        assert_eq!(snap.paused_duration, 4_000);
        assert_eq!(snap.duration, 1_000);
        assert!(snap.end_time.is_some());

        // Ended sessions stop accruing time.
        clock.advance_ms(30_000);
        assert_eq!(session.duration_ms(), 1_000);
    }

    #[test]
    fn activity_ignored_unless_running() {
        let clock = clock();
        let mut session = Session::new(clock.clone());
        assert!(!session.record_activity(Some("a.rs")));

        session.start();
        assert!(session.record_activity(Some("a.rs")));
        session.pause();
        assert!(!session.record_activity(Some("b.rs")));
        session.resume();
        session.end();
        assert!(!session.record_activity(Some("c.rs")));

        assert_eq!(session.keystrokes(), 1);
        assert_eq!(session.files_worked_on(), ["a.rs".to_string()]);
    }

    #[test]
    fn files_are_unique_and_insertion_ordered() {
        let mut session = Session::new(clock());
        session.start();
        for file in ["b.rs", "a.rs", "b.rs", "c.rs", "a.rs"] {
            session.record_activity(Some(file));
        }
        session.record_activity(None);
        assert_eq!(session.files_worked_on(), ["b.rs", "a.rs", "c.rs"]);
        assert_eq!(session.keystrokes(), 6);
    }

    #[test]
    fn auto_pause_after_strictly_exceeding_timeout() {
        let clock = clock();
        let mut session = Session::new(clock.clone());
        session.start();
        clock.advance_ms(1_000);
        session.record_activity(None);
        assert!(!session.should_auto_pause(1_000));

        clock.advance_ms(1_000);
        assert!(!session.should_auto_pause(1_000));
        clock.advance_ms(1);
        assert!(session.should_auto_pause(1_000));

        session.pause();
        assert!(!session.should_auto_pause(1_000));
    }

    #[test]
    fn snapshot_serializes_with_persisted_field_names() {
        let mut session = Session::new(clock());
        session.start();
        let json = serde_json::to_value(session.snapshot()).unwrap();
        for key in [
            "id",
            "startTime",
            "endTime",
            "duration",
            "isActive",
            "isPaused",
            "pausedDuration",
            "filesWorkedOn",
            "keystrokes",
            "activeTime",
            "flowStateDetected",
            "flowStateDuration",
            "interruptions",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json["endTime"].is_null());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Pause,
        Resume,
        Activity,
        Wait(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Pause),
            Just(Op::Resume),
            Just(Op::Activity),
            (0i64..120_000).prop_map(Op::Wait),
        ]
    }

    proptest! {
        #[test]
        fn paused_duration_monotonic_and_duration_bounded(
            ops in proptest::collection::vec(op(), 1..60),
            end in any::<bool>(),
        ) {
            let clock = clock();
            let mut session = Session::new(clock.clone());
            session.start();
            let started = clock.now();
            let mut last_paused = 0;

            for op in ops {
                match op {
                    Op::Pause => { session.pause(); }
                    Op::Resume => { session.resume(); }
                    Op::Activity => { session.record_activity(Some("x.rs")); }
                    Op::Wait(ms) => clock.advance_ms(ms),
                }
                let paused = session.paused_duration_ms();
                prop_assert!(paused >= last_paused);
                last_paused = paused;

                let elapsed = (clock.now() - started).num_milliseconds();
                let duration = session.duration_ms();
                prop_assert!(duration >= 0);
                prop_assert!(duration <= elapsed);
            }

            if end {
                session.end();
                let snap = session.snapshot();
                prop_assert!(!snap.is_paused);
                prop_assert!(snap.paused_duration >= last_paused);
                prop_assert!(snap.duration >= 0);
            }
        }
    }
}
