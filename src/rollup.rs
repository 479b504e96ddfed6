// Rates, hour/day rollups and min/max envelopes. Pure functions over ordered samples;
// nothing here touches the store, so re-running over the same input yields the same output.

use std::collections::BTreeMap;
use tracing::warn;

use crate::models::{Envelope, GaugeRollup, MinMaxEnvelope, RollupWindow, Sample};

/// Rates are rounded to 2 decimals for display stability.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Per-second rate of a delta; null delta or non-positive elapsed time yields null.
pub fn rate(delta: Option<i64>, elapsed_seconds: f64) -> Option<f64> {
    if elapsed_seconds <= 0.0 {
        return None;
    }
    delta.map(|d| round2(d as f64 / elapsed_seconds))
}

/// Start of the window containing `ts` (epoch millis, UTC boundaries).
pub fn window_start(ts: i64, window_ms: i64) -> i64 {
    ts - ts.rem_euclid(window_ms)
}

/// Groups consecutive samples falling into the same window and folds each group.
/// Empty windows are never emitted.
pub fn rollup(samples: &[Sample], window_ms: i64, gauges: GaugeRollup) -> Vec<RollupWindow> {
    let mut out = Vec::new();
    let mut group: Vec<&Sample> = Vec::new();
    let mut group_start: Option<i64> = None;

    for sample in samples {
        let start = window_start(sample.created_at, window_ms);
        if group_start.is_some_and(|s| s != start) {
            out.extend(fold_window(&group, group_start, window_ms, gauges));
            group.clear();
        }
        group_start = Some(start);
        group.push(sample);
    }
    out.extend(fold_window(&group, group_start, window_ms, gauges));
    out
}

/// Folds one group: counters summed (null if any contributor is null),
/// rates averaged over non-null contributors, gauges carried per policy.
fn fold_window(
    group: &[&Sample],
    window_start: Option<i64>,
    window_ms: i64,
    gauges: GaugeRollup,
) -> Option<RollupWindow> {
    let window_start = window_start?;
    if group.is_empty() {
        return None;
    }

    let mut summed_deltas: BTreeMap<String, Option<i64>> = BTreeMap::new();
    let mut rate_values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut carried_gauges: BTreeMap<String, Option<i64>> = BTreeMap::new();

    for name in group.iter().flat_map(|s| s.deltas.keys()) {
        summed_deltas
            .entry(name.clone())
            .or_insert_with(|| sum_deltas(group, name, window_start));
        rate_values.entry(name.clone()).or_insert_with(|| {
            group
                .iter()
                .filter_map(|s| s.rates.get(name).copied().flatten())
                .collect()
        });
    }

    for sample in group {
        for (name, value) in &sample.values {
            if sample.deltas.contains_key(name) {
                continue;
            }
            let slot = carried_gauges.entry(name.clone()).or_insert(None);
            if let Some(v) = *value {
                *slot = match (gauges, *slot) {
                    (GaugeRollup::Max, Some(prev)) => Some(prev.max(v)),
                    _ => Some(v),
                };
            }
        }
    }

    let averaged_rates = rate_values
        .into_iter()
        .map(|(name, rates)| (name, mean_f64(&rates).map(round2)))
        .collect();

    Some(RollupWindow {
        window_start,
        window_end: window_start + window_ms,
        sample_count: group.len(),
        elapsed_seconds: group.iter().map(|s| s.elapsed_seconds).sum(),
        summed_deltas,
        averaged_rates,
        carried_gauges,
    })
}

/// Min/max per column over a series of rows. Every column seen gets an entry,
/// even when all its values are null.
pub fn envelope<I>(rows: I) -> MinMaxEnvelope
where
    I: IntoIterator<Item = BTreeMap<String, Option<f64>>>,
{
    let mut out = MinMaxEnvelope::new();
    for row in rows {
        for (column, value) in row {
            let entry = out.entry(column).or_insert_with(Envelope::default);
            if let Some(v) = value {
                entry.min = Some(entry.min.map_or(v, |m| m.min(v)));
                entry.max = Some(entry.max.map_or(v, |m| m.max(v)));
            }
        }
    }
    out
}

/// Sum of one counter's deltas. Null if any contributor is null; a sum outside i64
/// is also reported as null, with a warning so it is not mistaken for missing data.
fn sum_deltas(group: &[&Sample], name: &str, window_start: i64) -> Option<i64> {
    let total = group.iter().try_fold(0i128, |acc, s| {
        s.deltas.get(name).copied().flatten().map(|d| acc + i128::from(d))
    })?;
    match i64::try_from(total) {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(
                operation = "rollup",
                metric = name,
                window_start,
                "window delta sum overflows i64; reported as null"
            );
            None
        }
    }
}

fn mean_f64(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    Some(v.iter().sum::<f64>() / (v.len() as f64))
}
