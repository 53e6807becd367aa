//! Orchestrator state machine.
//!
//! ```text
//! (none) --start--> Active <--pause/resume--> Paused
//!                     |  ^ tick: idle timeout     |
//!                     |  +--- activity (auto) ----+
//!                     +--end--> snapshot persisted, session discarded
//! ```
//!
//! Every operation is a short, non-blocking handler. Invalid requests
//! leave state unchanged and queue a `TransitionRejected` event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::runtime::HostCommand;
use super::scheduler::Scheduler;
use super::OrchestratorSettings;
use crate::clock::{Clock, SystemClock};
use crate::error::OrchestratorError;
use crate::events::{RejectReason, SessionEvent, Transition};
use crate::flow::{FlowAnalyzer, FlowMetrics, Insight};
use crate::session::{Session, SessionSnapshot, SessionState};
use crate::storage::SnapshotSink;

/// Flow periods observed during the live session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStats {
    /// Number of false -> true transitions of the flow flag.
    pub periods: u32,
    pub total_flow_ms: i64,
    pub longest_flow_ms: i64,
}

impl FlowStats {
    fn close_period(&mut self, duration_ms: i64) {
        self.total_flow_ms += duration_ms;
        self.longest_flow_ms = self.longest_flow_ms.max(duration_ms);
    }
}

pub struct SessionOrchestrator<S: SnapshotSink, C: Clock = SystemClock> {
    clock: C,
    settings: OrchestratorSettings,
    sink: S,
    session: Option<Session<C>>,
    analyzer: FlowAnalyzer<C>,
    scheduler: Scheduler,
    pending: Vec<SessionEvent>,
    flow_stats: FlowStats,
    last_break_reminder: Option<DateTime<Utc>>,
    last_flow_notification: Option<DateTime<Utc>>,
}

impl<S: SnapshotSink> SessionOrchestrator<S, SystemClock> {
    pub fn new(sink: S, settings: OrchestratorSettings) -> Self {
        Self::with_clock(sink, settings, SystemClock)
    }
}

impl<S: SnapshotSink, C: Clock> SessionOrchestrator<S, C> {
    pub fn with_clock(sink: S, settings: OrchestratorSettings, clock: C) -> Self {
        let scheduler = Scheduler::new(settings.tick_interval_ms, settings.autosave_interval_ms);
        Self {
            analyzer: FlowAnalyzer::new(clock.clone()),
            clock,
            settings,
            sink,
            session: None,
            scheduler,
            pending: Vec::new(),
            flow_stats: FlowStats::default(),
            last_break_reminder: None,
            last_flow_notification: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn session(&self) -> Option<&Session<C>> {
        self.session.as_ref()
    }

    pub fn analyzer(&self) -> &FlowAnalyzer<C> {
        &self.analyzer
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(Session::snapshot)
    }

    /// Whether the tick/autosave timers are armed.
    pub fn timers_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Earliest timer deadline, epoch milliseconds.
    pub fn next_deadline_ms(&self) -> Option<i64> {
        self.scheduler.next_deadline_ms()
    }

    /// Fresh flow metrics over the configured window.
    pub fn flow_metrics(&self) -> FlowMetrics {
        self.analyzer
            .analyze_current_flow_state(self.settings.flow_window_ms)
    }

    pub fn insights(&self) -> Vec<Insight> {
        Insight::from_metrics(&self.flow_metrics())
    }

    /// Flow statistics, counting an open flow period at its current length.
    pub fn flow_stats(&self) -> FlowStats {
        let mut stats = self.flow_stats;
        if let Some(session) = self.session.as_ref().filter(|s| s.flow_state_detected()) {
            stats.close_period(session.snapshot().flow_state_duration);
        }
        stats
    }

    /// Take all events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start a new session, or resume a paused one.
    pub fn start(&mut self) -> bool {
        match self.session.as_ref().map(Session::state) {
            Some(SessionState::Active) => {
                self.reject(Transition::Start, RejectReason::AlreadyActive);
                false
            }
            Some(SessionState::Paused { .. }) => self.resume(),
            Some(SessionState::Idle) | Some(SessionState::Ended) | None => {
                let mut session = Session::new(self.clock.clone());
                session.start();
                info!(session_id = session.id(), "session started");

                self.analyzer.reset();
                self.flow_stats = FlowStats::default();
                self.last_break_reminder = None;
                self.last_flow_notification = None;

                let snapshot = session.snapshot();
                self.emit(SessionEvent::Started {
                    session_id: snapshot.id.clone(),
                    at: self.clock.now(),
                });
                self.session = Some(session);
                self.persist_best_effort(&snapshot);
                self.scheduler.start(self.clock.now_ms());
                true
            }
        }
    }

    pub fn pause(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            self.reject(Transition::Pause, RejectReason::NoActiveSession);
            return false;
        };
        match session.state() {
            SessionState::Active => {
                session.pause();
                self.scheduler.stop();
                info!(session_id = session.id(), "session paused");
                self.emit(SessionEvent::Paused {
                    at: self.clock.now(),
                });
                true
            }
            SessionState::Paused { .. } => {
                self.reject(Transition::Pause, RejectReason::AlreadyPaused);
                false
            }
            SessionState::Idle | SessionState::Ended => {
                self.reject(Transition::Pause, RejectReason::NoActiveSession);
                false
            }
        }
    }

    pub fn resume(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            self.reject(Transition::Resume, RejectReason::NoActiveSession);
            return false;
        };
        match session.state() {
            SessionState::Paused { .. } => {
                session.resume();
                self.scheduler.start(self.clock.now_ms());
                info!(session_id = session.id(), "session resumed");
                self.emit(SessionEvent::Resumed {
                    at: self.clock.now(),
                });
                true
            }
            SessionState::Active => {
                self.reject(Transition::Resume, RejectReason::NotPaused);
                false
            }
            SessionState::Idle | SessionState::Ended => {
                self.reject(Transition::Resume, RejectReason::NoActiveSession);
                false
            }
        }
    }

    /// End the live session and write its final snapshot.
    ///
    /// Returns `Ok(None)` when there is nothing to end. The session is
    /// discarded and timers stopped even if the final write fails; the
    /// error then carries the snapshot.
    pub fn end(&mut self) -> Result<Option<SessionSnapshot>, OrchestratorError> {
        self.scheduler.stop();
        let Some(mut session) = self.session.take() else {
            self.reject(Transition::End, RejectReason::NoActiveSession);
            return Ok(None);
        };

        if session.flow_state_detected() {
            self.flow_stats
                .close_period(session.snapshot().flow_state_duration);
        }
        session.end();
        let snapshot = session.snapshot();
        info!(
            session_id = %snapshot.id,
            duration_ms = snapshot.duration,
            keystrokes = snapshot.keystrokes,
            "session ended"
        );

        let written = self.sink.persist(&snapshot);
        self.emit(SessionEvent::Ended {
            snapshot: Box::new(snapshot.clone()),
        });
        match written {
            Ok(()) => Ok(Some(snapshot)),
            Err(source) => {
                warn!(session_id = %snapshot.id, error = %source, "final session write failed");
                self.emit(SessionEvent::PersistFailed {
                    final_write: true,
                    message: source.to_string(),
                });
                Err(OrchestratorError::FinalPersist {
                    snapshot: Box::new(snapshot),
                    source,
                })
            }
        }
    }

    /// Stop timers and finalize any live session.
    pub fn dispose(&mut self) -> Result<Option<SessionSnapshot>, OrchestratorError> {
        self.scheduler.stop();
        if self.session.is_none() {
            return Ok(None);
        }
        self.end()
    }

    /// One host interaction. Activity while paused resumes the session.
    pub fn record_activity(&mut self, file: Option<&str>) -> bool {
        let Some(session) = self.session.as_mut() else {
            debug!("activity without a live session ignored");
            return false;
        };

        if session.is_paused() {
            session.resume();
            self.scheduler.start(self.clock.now_ms());
            info!(session_id = session.id(), "session auto-resumed");
            self.emit(SessionEvent::AutoResumed {
                at: self.clock.now(),
            });
        }

        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let accepted = session.record_activity(file);
        if accepted {
            self.analyzer.record_keystroke(file);
        }
        accepted
    }

    /// Apply a host command.
    ///
    /// Only `End` can fail, when the final snapshot write is rejected.
    pub fn apply(&mut self, command: HostCommand) -> Result<(), OrchestratorError> {
        match command {
            HostCommand::Start => {
                self.start();
            }
            HostCommand::Pause => {
                self.pause();
            }
            HostCommand::Resume => {
                self.resume();
            }
            HostCommand::End => {
                self.end()?;
            }
            HostCommand::Activity { file } => {
                self.record_activity(file.as_deref());
            }
        }
        Ok(())
    }

    // ── Timers ───────────────────────────────────────────────────────

    /// Run whichever timers are due at the current clock time.
    pub fn poll(&mut self) {
        let due = self.scheduler.due(self.clock.now_ms());
        if due.tick {
            self.tick();
        }
        // A tick that auto-paused the session has disarmed the timers.
        if due.autosave && self.scheduler.is_running() {
            self.autosave();
        }
    }

    /// Periodic policy pass: idle auto-pause, break reminder, flow tracking.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let idle_timeout_ms = self.settings.idle_timeout_ms;

        let Some(session) = self.session.as_mut() else {
            self.analyzer.record_inactivity();
            return;
        };
        if !session.state().is_running() {
            self.analyzer.record_inactivity();
            return;
        }

        if session.should_auto_pause(idle_timeout_ms) {
            session.pause();
            session.record_interruption();
            self.scheduler.stop();
            self.analyzer.record_inactivity();
            info!(
                session_id = session.id(),
                idle_ms = session.idle_ms(),
                "session auto-paused"
            );
            self.emit(SessionEvent::AutoPaused {
                idle_minutes: (idle_timeout_ms / 60_000).max(0) as u64,
                at: now,
            });
            return;
        }

        let duration_ms = session.duration_ms();
        if self.settings.break_reminders_enabled
            && duration_ms > self.settings.break_after_ms
            && elapsed_since(self.last_break_reminder, now) >= self.settings.break_cooldown_ms
        {
            self.last_break_reminder = Some(now);
            self.emit(SessionEvent::BreakSuggested {
                duration_ms,
                at: now,
            });
        }

        if self.settings.flow_detection_enabled {
            self.update_flow(now);
        }
    }

    fn update_flow(&mut self, now: DateTime<Utc>) {
        let metrics = self.flow_metrics();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match (session.flow_state_detected(), metrics.is_flow()) {
            (false, true) => {
                session.set_flow_state(true);
                session.set_flow_state_duration(metrics.flow_duration);
                self.flow_stats.periods += 1;
                info!(
                    session_id = session.id(),
                    probability = metrics.flow_probability,
                    "flow state entered"
                );
                let cooldown = self.settings.flow_notification_cooldown_ms;
                if elapsed_since(self.last_flow_notification, now) >= cooldown {
                    self.last_flow_notification = Some(now);
                    self.emit(SessionEvent::FlowEntered {
                        duration_ms: metrics.flow_duration,
                        at: now,
                    });
                }
            }
            (true, true) => session.set_flow_state_duration(metrics.flow_duration),
            (true, false) => {
                session.set_flow_state(false);
                let duration_ms = session.snapshot().flow_state_duration;
                self.flow_stats.close_period(duration_ms);
                debug!(session_id = session.id(), duration_ms, "flow state exited");
                self.emit(SessionEvent::FlowExited {
                    duration_ms,
                    at: now,
                });
            }
            (false, false) => {}
        }
    }

    /// Best-effort write of the live session's current snapshot.
    pub fn autosave(&mut self) {
        if let Some(snapshot) = self.snapshot() {
            self.persist_best_effort(&snapshot);
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn persist_best_effort(&mut self, snapshot: &SessionSnapshot) {
        if let Err(e) = self.sink.persist(snapshot) {
            warn!(session_id = %snapshot.id, error = %e, "snapshot write failed");
            self.emit(SessionEvent::PersistFailed {
                final_write: false,
                message: e.to_string(),
            });
        }
    }

    fn reject(&mut self, attempted: Transition, reason: RejectReason) {
        debug!(?attempted, ?reason, "transition rejected");
        self.emit(SessionEvent::TransitionRejected { attempted, reason });
    }

    fn emit(&mut self, event: SessionEvent) {
        self.pending.push(event);
    }
}

impl<S: SnapshotSink, C: Clock> Drop for SessionOrchestrator<S, C> {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}

/// Milliseconds since `last`, or `i64::MAX` if it never happened.
fn elapsed_since(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    last.map_or(i64::MAX, |t| (now - t).num_milliseconds())
}
