use serde::{Deserialize, Serialize};

/// Flow probability above which the developer is considered in flow.
pub const FLOW_THRESHOLD: f64 = 0.7;

pub const RHYTHM_WEIGHT: f64 = 0.25;
pub const FOCUS_WEIGHT: f64 = 0.35;
pub const SWITCHING_WEIGHT: f64 = 0.25;
pub const ERROR_WEIGHT: f64 = 0.15;

/// Sub-scores of one flow analysis, each in `[0, 1]`.
///
/// `error_rate` is a quality score: 1 means few rapid-correction bursts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMetrics {
    pub typing_rhythm: f64,
    pub focus_consistency: f64,
    pub context_switching: f64,
    pub error_rate: f64,
    pub flow_probability: f64,
    /// Longest continuous activity run in the window, ms. Zero unless in flow.
    pub flow_duration: i64,
}

impl FlowMetrics {
    /// Neutral result returned when the window holds too few samples.
    pub fn insufficient_data() -> Self {
        Self {
            typing_rhythm: 0.0,
            focus_consistency: 0.0,
            context_switching: 1.0,
            error_rate: 0.5,
            flow_probability: 0.0,
            flow_duration: 0,
        }
    }

    pub fn is_flow(&self) -> bool {
        self.flow_probability > FLOW_THRESHOLD
    }

    /// Fixed-weight combination of the four sub-scores.
    pub fn combine(
        typing_rhythm: f64,
        focus_consistency: f64,
        context_switching: f64,
        error_rate: f64,
    ) -> f64 {
        let p = typing_rhythm * RHYTHM_WEIGHT
            + focus_consistency * FOCUS_WEIGHT
            + context_switching * SWITCHING_WEIGHT
            + error_rate * ERROR_WEIGHT;
        p.clamp(0.0, 1.0)
    }
}

impl Default for FlowMetrics {
    fn default() -> Self {
        Self::insufficient_data()
    }
}

/// Advisory produced from low sub-scores.
///
/// Carries no display text; presentation layers map [`Insight::key`] to
/// their own wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Insight {
    /// typing rhythm < 0.5
    IrregularRhythm,
    /// focus consistency < 0.6
    ScatteredFocus,
    /// context switching score < 0.7
    FrequentSwitching,
    /// error quality < 0.7
    HighErrorRate,
    /// Nothing flagged.
    SteadyFlow,
}

impl Insight {
    pub fn key(&self) -> &'static str {
        match self {
            Insight::IrregularRhythm => "irregular_rhythm",
            Insight::ScatteredFocus => "scattered_focus",
            Insight::FrequentSwitching => "frequent_switching",
            Insight::HighErrorRate => "high_error_rate",
            Insight::SteadyFlow => "steady_flow",
        }
    }

    /// Advisories for a metric set, or `[SteadyFlow]` if none triggered.
    pub fn from_metrics(metrics: &FlowMetrics) -> Vec<Insight> {
        let mut insights = Vec::new();
        if metrics.typing_rhythm < 0.5 {
            insights.push(Insight::IrregularRhythm);
        }
        if metrics.focus_consistency < 0.6 {
            insights.push(Insight::ScatteredFocus);
        }
        if metrics.context_switching < 0.7 {
            insights.push(Insight::FrequentSwitching);
        }
        if metrics.error_rate < 0.7 {
            insights.push(Insight::HighErrorRate);
        }
        if insights.is_empty() {
            insights.push(Insight::SteadyFlow);
        }
        insights
    }
}
