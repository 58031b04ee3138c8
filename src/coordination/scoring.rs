//! Weighted audio quality scoring

use anyhow::Result;

use crate::storage::{Database, QualityMetric};

/// Component weights: (volume, background noise, clarity, proximity).
///
/// Noise is inverted before weighting since lower noise is better.
pub const QUALITY_WEIGHTS: (f64, f64, f64, f64) = (0.30, 0.25, 0.25, 0.20);

/// Compute the weighted overall score of a quality metric.
///
/// Absent components contribute zero weight and zero value; the sum is not
/// renormalized over the present weights, so partial readings score lower.
pub fn score_metric(metric: &QualityMetric) -> f64 {
    let (w_volume, w_noise, w_clarity, w_proximity) = QUALITY_WEIGHTS;
    let mut score = 0.0;

    if let Some(volume) = metric.volume_level {
        score += w_volume * volume;
    }

    if let Some(noise) = metric.background_noise {
        // Lower noise is better, so invert the reading
        score += w_noise * (1.0 - noise);
    }

    if let Some(clarity) = metric.clarity_score {
        score += w_clarity * clarity;
    }

    if let Some(proximity) = metric.proximity_score {
        score += w_proximity * proximity;
    }

    score
}

/// Score a metric and persist the result onto the metric row
pub fn score_and_store(db: &Database, metric: &mut QualityMetric) -> Result<f64> {
    let score = score_metric(metric);
    metric.overall_score = Some(score);
    if metric.id != 0 {
        db.set_metric_overall_score(metric.id, score)?;
    }
    Ok(score)
}
