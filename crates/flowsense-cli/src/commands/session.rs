use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use flowsense_core::orchestrator::runtime;
use flowsense_core::{
    Clock, Config, Database, HostCommand, ManualClock, MemorySink, OrchestratorSettings,
    SessionEvent, SessionOrchestrator, SessionSnapshot, SnapshotSink,
};
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::render::{event_json, insight_text};

const LIVE_POLL_EVERY: Duration = Duration::from_millis(500);

#[derive(Subcommand)]
pub enum SessionAction {
    /// Replay a JSON-lines activity log on a simulated clock
    Replay {
        /// File with one `{"at", "kind", "file"?}` record per line
        file: PathBuf,
        /// Flow analysis window in minutes (overrides config)
        #[arg(long)]
        window_min: Option<u64>,
        /// Keep snapshots in memory instead of the database
        #[arg(long)]
        no_store: bool,
    },
    /// Track a session from stdin: each line is a file being edited,
    /// `:pause`, `:resume` and `:end` control the session
    Live,
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_or_default();

    match action {
        SessionAction::Replay {
            file,
            window_min,
            no_store,
        } => {
            if let Some(minutes) = window_min {
                config.flow.window_min = minutes;
            }
            let sink: Box<dyn SnapshotSink> = if no_store {
                Box::new(MemorySink::new())
            } else {
                Box::new(Database::open()?)
            };
            let records = parse_records(&file)?;
            let stdout = std::io::stdout();
            replay(
                &records,
                sink,
                config.orchestrator_settings(),
                &mut stdout.lock(),
            )
        }
        SessionAction::Live => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            rt.block_on(live(config.orchestrator_settings()))
        }
    }
}

// ── Replay ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RecordKind {
    Start,
    Activity,
    Pause,
    Resume,
    End,
    /// Only advances time.
    Idle,
}

#[derive(Debug, Deserialize)]
struct Record {
    at: DateTime<Utc>,
    kind: RecordKind,
    #[serde(default)]
    file: Option<String>,
}

fn parse_records(path: &Path) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(line)
            .map_err(|e| format!("{}:{}: {e}", path.display(), i + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn print_events<W: Write>(
    out: &mut W,
    events: Vec<SessionEvent>,
    last_ended: &mut Option<SessionSnapshot>,
) -> Result<(), Box<dyn std::error::Error>> {
    for event in events {
        if let SessionEvent::Ended { snapshot } = &event {
            *last_ended = Some((**snapshot).clone());
        }
        writeln!(out, "{}", event_json(&event)?)?;
    }
    Ok(())
}

/// Replay `records`, writing events and the summary as JSON lines.
///
/// A failed final write is reported as an error after its events are
/// printed.
fn replay<W: Write>(
    records: &[Record],
    sink: Box<dyn SnapshotSink>,
    settings: OrchestratorSettings,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = records.first().map_or_else(Utc::now, |r| r.at);
    let clock = ManualClock::new(start);
    let mut orch = SessionOrchestrator::with_clock(sink, settings, clock.clone());
    let mut last_ended = None;

    for record in records {
        let target_ms = record.at.timestamp_millis();
        if target_ms < clock.now_ms() {
            warn!(at = %record.at, "record out of order, replaying at current time");
        }
        // Fire every timer deadline between the previous record and this one.
        while let Some(deadline) = orch.next_deadline_ms().filter(|d| *d <= target_ms) {
            clock.set_ms(deadline);
            orch.poll();
            print_events(out, orch.drain_events(), &mut last_ended)?;
        }
        clock.set(record.at);

        let command = match record.kind {
            RecordKind::Start => Some(HostCommand::Start),
            RecordKind::Activity => Some(HostCommand::Activity {
                file: record.file.clone(),
            }),
            RecordKind::Pause => Some(HostCommand::Pause),
            RecordKind::Resume => Some(HostCommand::Resume),
            RecordKind::End => Some(HostCommand::End),
            RecordKind::Idle => None,
        };
        let applied = command.map_or(Ok(()), |command| orch.apply(command));
        print_events(out, orch.drain_events(), &mut last_ended)?;
        applied?;
    }
    info!(records = records.len(), "replay finished");

    let metrics = orch.flow_metrics();
    let insights: Vec<&str> = orch.insights().into_iter().map(insight_text).collect();
    let summary = json!({
        "summary": {
            "snapshot": orch.snapshot().or(last_ended),
            "metrics": metrics,
            "insights": insights,
            "flow_stats": orch.flow_stats(),
        }
    });
    writeln!(out, "{summary}")?;
    Ok(())
}

// ── Live ─────────────────────────────────────────────────────────────

fn stdin_command(line: &str) -> Option<HostCommand> {
    match line.trim() {
        "" => None,
        ":pause" => Some(HostCommand::Pause),
        ":resume" => Some(HostCommand::Resume),
        ":end" => Some(HostCommand::End),
        file => Some(HostCommand::Activity {
            file: Some(file.to_string()),
        }),
    }
}

async fn live(settings: OrchestratorSettings) -> Result<(), Box<dyn std::error::Error>> {
    let orch = SessionOrchestrator::new(Database::open()?, settings);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();

    let driver = tokio::spawn(runtime::run(orch, cmd_rx, ev_tx, LIVE_POLL_EVERY));
    let printer = tokio::spawn(async move {
        while let Some(event) = ev_rx.recv().await {
            match event_json(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "event could not be encoded"),
            }
        }
    });

    cmd_tx.send(HostCommand::Start).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = stdin_command(&line) else {
            continue;
        };
        let done = command == HostCommand::End;
        cmd_tx.send(command).await?;
        if done {
            break;
        }
    }
    drop(cmd_tx);

    let result = driver.await?;
    printer.await?;
    result?;
    Ok(())
}
