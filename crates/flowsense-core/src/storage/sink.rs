//! Persistence collaborator seam.

use crate::error::StoreError;
use crate::session::SessionSnapshot;

/// Destination for session snapshots.
///
/// Writes are idempotent per snapshot id: a later snapshot of the same
/// session replaces the earlier one.
pub trait SnapshotSink {
    fn persist(&mut self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;
}

impl<S: SnapshotSink + ?Sized> SnapshotSink for Box<S> {
    fn persist(&mut self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        (**self).persist(snapshot)
    }
}

/// In-memory sink that records every write. Can be switched into a
/// failing mode to exercise error paths.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    writes: Vec<SessionSnapshot>,
    failing: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// All accepted writes, oldest first.
    pub fn writes(&self) -> &[SessionSnapshot] {
        &self.writes
    }

    pub fn latest(&self) -> Option<&SessionSnapshot> {
        self.writes.last()
    }
}

impl SnapshotSink for MemorySink {
    fn persist(&mut self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        if self.failing {
            return Err(StoreError::Unavailable("memory sink set to fail".into()));
        }
        self.writes.push(snapshot.clone());
        Ok(())
    }
}
