//! Deadline-based periodic timers owned by one orchestrator.
//!
//! Nothing here sleeps or spawns: the owner asks [`Scheduler::due`] which
//! timers expired and runs them. Stopping simply disarms both deadlines, so
//! a stopped scheduler can never fire against a session that should not
//! tick.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    pub tick: bool,
    pub autosave: bool,
}

impl Due {
    pub fn any(&self) -> bool {
        self.tick || self.autosave
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    tick_every_ms: i64,
    autosave_every_ms: i64,
    next_tick_ms: Option<i64>,
    next_autosave_ms: Option<i64>,
}

impl Scheduler {
    pub fn new(tick_every_ms: i64, autosave_every_ms: i64) -> Self {
        Self {
            tick_every_ms: tick_every_ms.max(1),
            autosave_every_ms: autosave_every_ms.max(1),
            next_tick_ms: None,
            next_autosave_ms: None,
        }
    }

    /// Arm both timers relative to `now_ms`. Re-arming resets the phase.
    pub fn start(&mut self, now_ms: i64) {
        self.next_tick_ms = Some(now_ms.saturating_add(self.tick_every_ms));
        self.next_autosave_ms = Some(now_ms.saturating_add(self.autosave_every_ms));
    }

    pub fn stop(&mut self) {
        self.next_tick_ms = None;
        self.next_autosave_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_tick_ms.is_some() || self.next_autosave_ms.is_some()
    }

    /// Earliest armed deadline.
    pub fn next_deadline_ms(&self) -> Option<i64> {
        match (self.next_tick_ms, self.next_autosave_ms) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Report expired timers and re-arm them one period after `now_ms`.
    /// Missed periods are coalesced into a single firing.
    pub fn due(&mut self, now_ms: i64) -> Due {
        Due {
            tick: Self::fire(&mut self.next_tick_ms, self.tick_every_ms, now_ms),
            autosave: Self::fire(&mut self.next_autosave_ms, self.autosave_every_ms, now_ms),
        }
    }

    fn fire(deadline: &mut Option<i64>, every_ms: i64, now_ms: i64) -> bool {
        match *deadline {
            Some(at) if at <= now_ms => {
                *deadline = Some(now_ms.saturating_add(every_ms));
                true
            }
            _ => false,
        }
    }
}
