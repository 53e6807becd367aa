mod snapshot;
mod state;

pub use snapshot::SessionSnapshot;
pub use state::{Session, SessionState};
