//! Human-readable wording for core events and insights.

use flowsense_core::{Insight, RejectReason, SessionEvent};
use serde_json::Value;

pub fn insight_text(insight: Insight) -> &'static str {
    match insight {
        Insight::IrregularRhythm => "Try to keep a steady typing rhythm",
        Insight::ScatteredFocus => "Work in longer focused stretches",
        Insight::FrequentSwitching => "Frequent file switching is breaking your focus",
        Insight::HighErrorRate => "Lots of rapid corrections, consider slowing down",
        Insight::SteadyFlow => "Great focus, keep it up",
    }
}

fn minutes(ms: i64) -> i64 {
    ms / 60_000
}

pub fn event_text(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Started { .. } => "Session started".into(),
        SessionEvent::Paused { .. } => "Session paused".into(),
        SessionEvent::Resumed { .. } => "Session resumed".into(),
        SessionEvent::Ended { snapshot } => format!(
            "Session ended after {} min, {} keystrokes",
            minutes(snapshot.duration),
            snapshot.keystrokes
        ),
        SessionEvent::AutoPaused { idle_minutes, .. } => {
            format!("Paused after {idle_minutes} min of inactivity")
        }
        SessionEvent::AutoResumed { .. } => "Activity detected, session resumed".into(),
        SessionEvent::BreakSuggested { duration_ms, .. } => format!(
            "You have been coding for {} min, time for a short break",
            minutes(*duration_ms)
        ),
        SessionEvent::FlowEntered { .. } => "You are in the flow".into(),
        SessionEvent::FlowExited { duration_ms, .. } => {
            format!("Flow period ended after {} s", duration_ms / 1_000)
        }
        SessionEvent::TransitionRejected { reason, .. } => match reason {
            RejectReason::AlreadyActive => "A session is already active".into(),
            RejectReason::AlreadyPaused => "Session is already paused".into(),
            RejectReason::NotPaused => "Session is not paused".into(),
            RejectReason::NoActiveSession => "No active session".into(),
        },
        SessionEvent::PersistFailed {
            final_write: true,
            message,
        } => format!("Could not save the finished session: {message}"),
        SessionEvent::PersistFailed { message, .. } => format!("Autosave failed: {message}"),
    }
}

/// Event as a JSON object with an added `message` field.
pub fn event_json(event: &SessionEvent) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(event)?;
    if let Value::Object(map) = &mut value {
        map.insert("message".into(), Value::String(event_text(event)));
    }
    Ok(value)
}
