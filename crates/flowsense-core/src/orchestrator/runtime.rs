//! Async host loop for a [`SessionOrchestrator`].
//!
//! Commands arrive over an mpsc channel; timers are polled on a fixed
//! interval. Events drained after every step are forwarded to the host.
//! The loop exits when the command channel closes, disposing the
//! orchestrator so a live session gets its final write. A failed final
//! write from an `End` command is returned once the loop stops.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::engine::SessionOrchestrator;
use crate::clock::Clock;
use crate::error::OrchestratorError;
use crate::events::SessionEvent;
use crate::session::SessionSnapshot;
use crate::storage::SnapshotSink;

/// Host request delivered to the orchestrator loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    Start,
    Pause,
    Resume,
    End,
    Activity { file: Option<String> },
}

/// Drive `orchestrator` until `commands` closes.
///
/// Returns the final snapshot written by disposal, if a session was live.
pub async fn run<S, C>(
    mut orchestrator: SessionOrchestrator<S, C>,
    mut commands: mpsc::Receiver<HostCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
    poll_every: Duration,
) -> Result<Option<SessionSnapshot>, OrchestratorError>
where
    S: SnapshotSink,
    C: Clock,
{
    let mut ticker = interval(poll_every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("orchestrator loop started");

    let mut final_failure = None;
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    debug!(?command, "host command");
                    if let Err(e) = orchestrator.apply(command) {
                        warn!(error = %e, "final session write failed");
                        final_failure = Some(e);
                    }
                }
                None => break,
            },
            _ = ticker.tick() => orchestrator.poll(),
        }
        forward(&mut orchestrator, &events);
    }

    let result = orchestrator.dispose();
    forward(&mut orchestrator, &events);
    info!("orchestrator loop stopped");
    match final_failure {
        Some(e) if result.is_ok() => Err(e),
        _ => result,
    }
}

fn forward<S: SnapshotSink, C: Clock>(
    orchestrator: &mut SessionOrchestrator<S, C>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) {
    for event in orchestrator.drain_events() {
        // A host that stopped listening still gets the loop driven to completion.
        let _ = events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::orchestrator::OrchestratorSettings;
    use crate::storage::MemorySink;
    use chrono::{TimeZone, Utc};

    fn orchestrator() -> SessionOrchestrator<MemorySink, ManualClock> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        SessionOrchestrator::with_clock(MemorySink::new(), OrchestratorSettings::default(), clock)
    }

    fn collect(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        kinds
    }

    #[tokio::test]
    async fn commands_are_applied_and_events_forwarded() {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(orchestrator(), cmd_rx, ev_tx, Duration::from_millis(5)));

        cmd_tx.send(HostCommand::Start).await.unwrap();
        cmd_tx
            .send(HostCommand::Activity {
                file: Some("lib.rs".into()),
            })
            .await
            .unwrap();
        cmd_tx.send(HostCommand::End).await.unwrap();
        drop(cmd_tx);

        let result = handle.await.unwrap().unwrap();
        assert_eq!(result, None);
        assert_eq!(collect(&mut ev_rx), vec!["started", "ended"]);
    }

    #[tokio::test]
    async fn closing_channel_finalizes_live_session() {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(orchestrator(), cmd_rx, ev_tx, Duration::from_millis(5)));

        cmd_tx.send(HostCommand::Start).await.unwrap();
        cmd_tx.send(HostCommand::Pause).await.unwrap();
        drop(cmd_tx);

        let snapshot = handle.await.unwrap().unwrap().unwrap();
        assert!(!snapshot.is_active);
        assert!(snapshot.end_time.is_some());
        assert_eq!(collect(&mut ev_rx), vec!["started", "paused", "ended"]);
    }

    #[tokio::test]
    async fn dropped_event_receiver_does_not_stop_loop() {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        drop(ev_rx);
        let handle = tokio::spawn(run(orchestrator(), cmd_rx, ev_tx, Duration::from_millis(5)));

        cmd_tx.send(HostCommand::Start).await.unwrap();
        drop(cmd_tx);
        assert!(handle.await.unwrap().unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_final_write_is_returned() {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
        let mut orch = orchestrator();
        orch.sink_mut().set_failing(true);
        let handle = tokio::spawn(run(orch, cmd_rx, ev_tx, Duration::from_millis(5)));

        cmd_tx.send(HostCommand::Start).await.unwrap();
        cmd_tx.send(HostCommand::End).await.unwrap();
        drop(cmd_tx);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, OrchestratorError::FinalPersist { .. }));
        assert!(collect(&mut ev_rx).contains(&"persist_failed"));
    }

    #[test]
    fn host_command_json_shape() {
        let json = serde_json::to_value(HostCommand::Activity {
            file: Some("a.rs".into()),
        })
        .unwrap();
        assert_eq!(json["command"], "activity");
        assert_eq!(json["file"], "a.rs");
    }
}
