// Hour/day rollups and envelopes over derived samples

mod common;

use common::*;
use dbcheckpoint::diff::samples_from;
use dbcheckpoint::metrics::MetricRegistry;
use dbcheckpoint::models::{GaugeRollup, Sample};
use dbcheckpoint::rollup::{envelope, rate, rollup, round2, window_start};
use std::collections::BTreeMap;

fn sample(snapshot_id: i64, created_at: i64, delta: Option<i64>, gauge: Option<i64>) -> Sample {
    let elapsed_seconds = 60.0;
    Sample {
        snapshot_id,
        created_at,
        elapsed_seconds,
        values: BTreeMap::from([
            ("queries".to_string(), Some(0)),
            ("max_connections".to_string(), gauge),
        ]),
        deltas: BTreeMap::from([("queries".to_string(), delta)]),
        rates: BTreeMap::from([("queries".to_string(), rate(delta, elapsed_seconds))]),
    }
}

#[test]
fn rate_and_rounding() {
    assert_eq!(round2(3.333_333), 3.33);
    assert_eq!(round2(2.005_1), 2.01);
    assert_eq!(rate(Some(200), 60.0), Some(3.33));
    assert_eq!(rate(None, 60.0), None);
    assert_eq!(rate(Some(1), 0.0), None);
}

#[test]
fn window_start_aligns_to_utc_boundaries() {
    assert_eq!(window_start(T0 + 59 * MINUTE_MS, HOUR_MS), T0);
    assert_eq!(window_start(T0 + HOUR_MS, HOUR_MS), T0 + HOUR_MS);
    assert_eq!(window_start(T0 + 23 * HOUR_MS, DAY_MS), T0);
}

#[test]
fn hour_rollup_sums_deltas_of_its_samples() {
    let samples: Vec<Sample> = (1..=5)
        .map(|i| sample(i, T0 + i * 10 * MINUTE_MS, Some(i * 100), Some(100)))
        .collect();
    let windows = rollup(&samples, HOUR_MS, GaugeRollup::Last);
    // Samples at :10..:50 fall in hour 0.
    assert_eq!(windows.len(), 1);
    let w = &windows[0];
    assert_eq!(w.window_start, T0);
    assert_eq!(w.window_end, T0 + HOUR_MS);
    assert_eq!(w.sample_count, 5);
    assert_eq!(w.elapsed_seconds, 300.0);
    let expected: i64 = samples.iter().filter_map(|s| s.deltas["queries"]).sum();
    assert_eq!(w.summed_deltas["queries"], Some(expected));
}

#[test]
fn null_delta_forces_window_sum_to_null() {
    let samples = vec![
        sample(1, T0 + MINUTE_MS, Some(60), None),
        sample(2, T0 + 2 * MINUTE_MS, None, None),
        sample(3, T0 + 3 * MINUTE_MS, Some(180), None),
    ];
    let windows = rollup(&samples, HOUR_MS, GaugeRollup::Last);
    assert_eq!(windows[0].summed_deltas["queries"], None);
    // Rates average over non-null contributors only.
    assert_eq!(windows[0].averaged_rates["queries"], Some(2.0));
}

#[test]
fn overflowing_window_sum_is_null_but_rates_survive() {
    let samples = vec![
        sample(1, T0 + 10 * MINUTE_MS, Some(i64::MAX), Some(100)),
        sample(2, T0 + 20 * MINUTE_MS, Some(i64::MAX), Some(100)),
    ];
    let windows = rollup(&samples, HOUR_MS, GaugeRollup::Last);
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].summed_deltas["queries"], None);
    assert!(windows[0].averaged_rates["queries"].is_some_and(|r| r > 0.0));
}

#[test]
fn large_sums_within_i64_are_exact() {
    let half = i64::MAX / 2;
    let samples = vec![
        sample(1, T0 + 10 * MINUTE_MS, Some(half), Some(100)),
        sample(2, T0 + 20 * MINUTE_MS, Some(half), Some(100)),
    ];
    let windows = rollup(&samples, HOUR_MS, GaugeRollup::Last);
    assert_eq!(windows[0].summed_deltas["queries"], Some(half * 2));
}

#[test]
fn empty_windows_are_not_emitted() {
    let samples = vec![
        sample(1, T0 + MINUTE_MS, Some(1), Some(1)),
        sample(2, T0 + 5 * HOUR_MS, Some(2), Some(2)),
    ];
    let windows = rollup(&samples, HOUR_MS, GaugeRollup::Last);
    let starts: Vec<i64> = windows.iter().map(|w| w.window_start).collect();
    assert_eq!(starts, vec![T0, T0 + 5 * HOUR_MS]);
    assert!(rollup(&[], HOUR_MS, GaugeRollup::Last).is_empty());
}

#[test]
fn gauges_carry_last_or_max() {
    let samples = vec![
        sample(1, T0 + MINUTE_MS, Some(1), Some(300)),
        sample(2, T0 + 2 * MINUTE_MS, Some(1), Some(500)),
        sample(3, T0 + 3 * MINUTE_MS, Some(1), Some(200)),
        sample(4, T0 + 4 * MINUTE_MS, Some(1), None),
    ];
    let last = rollup(&samples, HOUR_MS, GaugeRollup::Last);
    assert_eq!(last[0].carried_gauges["max_connections"], Some(200));
    assert!(!last[0].carried_gauges.contains_key("queries"));

    let max = rollup(&samples, HOUR_MS, GaugeRollup::Max);
    assert_eq!(max[0].carried_gauges["max_connections"], Some(500));
}

#[test]
fn rollup_is_idempotent() {
    let samples: Vec<Sample> = (1..=48)
        .map(|i| sample(i, T0 + i * 30 * MINUTE_MS, Some(i), Some(i)))
        .collect();
    let first = rollup(&samples, DAY_MS, GaugeRollup::Last);
    let second = rollup(&samples, DAY_MS, GaugeRollup::Last);
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    let total: usize = first.iter().map(|w| w.sample_count).sum();
    assert_eq!(total, 48);
}

#[test]
fn rollup_over_derived_samples_matches_counter_total() {
    let registry = MetricRegistry::builtin();
    let snapshots: Vec<_> = (0..=12)
        .map(|i| snapshot(i + 1, T0 + i * 5 * MINUTE_MS, &[("queries", Some(1000 + i * 250))]))
        .collect();
    let samples = samples_from(&snapshots, &registry);
    assert_eq!(samples.len(), 12);
    let windows = rollup(&samples, HOUR_MS, GaugeRollup::Last);
    let sum: i64 = windows
        .iter()
        .filter_map(|w| w.summed_deltas["queries"])
        .sum();
    assert_eq!(sum, 12 * 250);
}

#[test]
fn envelope_tracks_min_max_and_all_null_columns() {
    let rows = vec![
        BTreeMap::from([("a".to_string(), Some(3.0)), ("b".to_string(), None)]),
        BTreeMap::from([("a".to_string(), Some(-1.5)), ("b".to_string(), None)]),
        BTreeMap::from([("a".to_string(), None), ("b".to_string(), None)]),
    ];
    let env = envelope(rows);
    assert_eq!(env["a"].min, Some(-1.5));
    assert_eq!(env["a"].max, Some(3.0));
    assert_eq!(env["b"].min, None);
    assert_eq!(env["b"].max, None);
}
