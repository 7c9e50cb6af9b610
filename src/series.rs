//! Turns cumulative historical counts into chart-ready daily changes.

use itertools::Itertools;

use crate::models::{HistoricalAll, MetricKind, TimeSeriesPoint};

/// Builds the day-over-day series for `metric`.
///
/// Dates are walked in upstream order. The first day has no predecessor and
/// produces no point, so `n` days yield `n - 1` points. Corrections that make
/// a cumulative count drop come through as negative deltas.
pub fn build_delta_series(history: &HistoricalAll, metric: MetricKind) -> Vec<TimeSeriesPoint> {
    metric
        .history(history)
        .iter()
        .tuple_windows()
        .map(|(previous, current)| TimeSeriesPoint {
            timestamp: current.date.clone(),
            delta: current.cumulative - previous.cumulative,
        })
        .collect()
}
