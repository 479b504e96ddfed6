// Diff engine: consecutive snapshot pair -> Sample (deltas + per-second rates).
// Table-driven by the registry: every metric goes through the same pure functions.

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::warn;

use crate::metrics::MetricRegistry;
use crate::models::{MetricKind, ParameterChange, Sample, Sign, Snapshot};
use crate::rollup::rate;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    /// Clock skew or duplicate instant; the pair is discarded.
    #[error(
        "invalid sample: snapshot {curr_id} is {elapsed_ms} ms after snapshot {prev_id} (must be > 0)"
    )]
    NonPositiveElapsed {
        prev_id: i64,
        curr_id: i64,
        elapsed_ms: i64,
    },
}

/// Delta of one counter. Null on either side propagates.
/// Unsigned counters that went down (restart) are charged their whole new value.
pub fn counter_delta(prev: Option<i64>, curr: Option<i64>, sign: Sign) -> Option<i64> {
    let (prev, curr) = (prev?, curr?);
    if curr >= prev {
        return Some(curr.saturating_sub(prev));
    }
    match sign {
        Sign::Unsigned => Some(curr),
        Sign::Signed => Some(curr.saturating_sub(prev)),
    }
}

/// Metric names of both snapshots plus every registered metric, so that a metric
/// missing from one capture still yields a (null) column.
fn column_names<'a>(
    prev: &'a Snapshot,
    curr: &'a Snapshot,
    registry: &'a MetricRegistry,
) -> BTreeSet<&'a str> {
    prev.values
        .keys()
        .chain(curr.values.keys())
        .map(String::as_str)
        .chain(registry.definitions().map(|d| d.name.as_str()))
        .collect()
}

pub fn diff(
    prev: &Snapshot,
    curr: &Snapshot,
    registry: &MetricRegistry,
) -> Result<Sample, SampleError> {
    let elapsed_ms = curr.created_at - prev.created_at;
    if elapsed_ms <= 0 {
        return Err(SampleError::NonPositiveElapsed {
            prev_id: prev.id,
            curr_id: curr.id,
            elapsed_ms,
        });
    }
    let elapsed_seconds = elapsed_ms as f64 / 1000.0;

    let mut sample = Sample {
        snapshot_id: curr.id,
        created_at: curr.created_at,
        elapsed_seconds,
        values: Default::default(),
        deltas: Default::default(),
        rates: Default::default(),
    };

    for name in column_names(prev, curr, registry) {
        let def = registry.definition(name);
        let curr_value = curr.values.get(name).copied().flatten();
        sample.values.insert(name.to_string(), curr_value);
        if def.kind == MetricKind::Counter {
            let prev_value = prev.values.get(name).copied().flatten();
            let delta = counter_delta(prev_value, curr_value, def.sign);
            sample.deltas.insert(name.to_string(), delta);
            sample
                .rates
                .insert(name.to_string(), rate(delta, elapsed_seconds));
        }
    }
    Ok(sample)
}

/// Samples for every consecutive pair of an ascending snapshot sequence.
/// Invalid pairs are logged and skipped; rollups only ever see valid samples.
pub fn samples_from(snapshots: &[Snapshot], registry: &MetricRegistry) -> Vec<Sample> {
    snapshots
        .windows(2)
        .filter_map(|pair| match diff(&pair[0], &pair[1], registry) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!(error = %e, operation = "diff", "skipping invalid sample");
                None
            }
        })
        .collect()
}

/// Gauges whose value changed between two snapshots (both sides non-null), ordered by name.
pub fn parameter_changes(
    prev: &Snapshot,
    curr: &Snapshot,
    registry: &MetricRegistry,
) -> Vec<ParameterChange> {
    column_names(prev, curr, registry)
        .into_iter()
        .filter(|name| registry.definition(name).kind == MetricKind::Gauge)
        .filter_map(|name| {
            let old_value = prev.values.get(name).copied().flatten()?;
            let new_value = curr.values.get(name).copied().flatten()?;
            (old_value != new_value).then(|| ParameterChange {
                created_at: curr.created_at,
                name: name.to_string(),
                old_value: Some(old_value),
                new_value: Some(new_value),
            })
        })
        .collect()
}
