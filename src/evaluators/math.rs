//! Shared severity and decay math for evaluators.
//!
//! Every limit-violation evaluator derives severity from its violation ratio
//! through the same curve so severities are comparable across evaluator
//! families.

use chrono::{DateTime, Utc};

/// Exponentially decay a confidence by the age of its triggering event.
///
/// `decayed = confidence * 0.5^(Δt / half_life_minutes)` with Δt the minutes
/// since `event_time`. Future events (Δt < 0) are returned unchanged.
pub fn decay_confidence(confidence: f64, event_time: DateTime<Utc>, half_life_minutes: f64) -> f64 {
    decay_confidence_at(confidence, event_time, half_life_minutes, Utc::now())
}

pub(crate) fn decay_confidence_at(
    confidence: f64,
    event_time: DateTime<Utc>,
    half_life_minutes: f64,
    now: DateTime<Utc>,
) -> f64 {
    let elapsed_minutes = (now - event_time).num_seconds() as f64 / 60.0;
    if elapsed_minutes < 0.0 || half_life_minutes <= 0.0 {
        return confidence;
    }
    confidence * 0.5_f64.powf(elapsed_minutes / half_life_minutes)
}

/// Severity from a limit-violation ratio.
///
/// `severity = min(max_confidence, ln(1 + (max(ratio, 1) - 1) * 10) / ln(11))`.
/// A ratio of 1.0 (exactly at the limit) yields 0; 2.0 saturates at
/// `max_confidence`. The log curve front-loads sensitivity just past the
/// limit.
pub fn severity_from_ratio(ratio: f64, max_confidence: f64) -> f64 {
    let excess = (ratio.max(1.0) - 1.0) * 10.0;
    (excess.ln_1p() / 10.0_f64.ln_1p()).min(max_confidence)
}
