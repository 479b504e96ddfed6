// Classifier and diff engine: deltas, restart policy, null propagation, parameter changes

mod common;

use common::*;
use dbcheckpoint::diff::{SampleError, counter_delta, diff, parameter_changes, samples_from};
use dbcheckpoint::metrics::MetricRegistry;
use dbcheckpoint::models::{MetricKind, Sign};
use dbcheckpoint::plugin::{CustomMetric, CustomMetricKind};

fn custom(id: i64, kind: CustomMetricKind) -> CustomMetric {
    CustomMetric {
        id,
        description: String::new(),
        expression: "SELECT 1".into(),
        kind,
        enabled: true,
    }
}

#[test]
fn classify_uses_static_tables_and_defaults() {
    let registry = MetricRegistry::builtin();
    assert_eq!(
        registry.classify("max_connections"),
        (MetricKind::Gauge, Sign::Unsigned)
    );
    assert_eq!(
        registry.classify("threads_connected"),
        (MetricKind::Counter, Sign::Signed)
    );
    assert_eq!(
        registry.classify("queries"),
        (MetricKind::Counter, Sign::Unsigned)
    );
    assert_eq!(
        registry.classify("some_counter_from_the_future"),
        (MetricKind::Counter, Sign::Unsigned)
    );
}

#[test]
fn classify_custom_metrics_by_declared_kind() {
    let registry = MetricRegistry::with_custom_metrics(&[
        custom(1, CustomMetricKind::Value),
        custom(2, CustomMetricKind::ValuePerSecond),
        custom(3, CustomMetricKind::ElapsedTime),
    ]);
    assert_eq!(registry.classify("custom_1").0, MetricKind::Counter);
    assert_eq!(registry.classify("custom_2").0, MetricKind::Counter);
    assert_eq!(registry.classify("custom_3").0, MetricKind::Gauge);
    assert_eq!(registry.classify("custom_1_time").0, MetricKind::Gauge);

    let names: Vec<&str> = registry.definitions().map(|d| d.name.as_str()).collect();
    assert!(names.contains(&"custom_1"));
    assert!(names.contains(&"custom_1_time"));
    assert!(names.contains(&"custom_2"));
    assert!(!names.contains(&"custom_2_time"));
    assert!(names.contains(&"custom_3_time"));
}

#[test]
fn registry_completes_missing_metrics_with_null() {
    let registry = MetricRegistry::builtin();
    let mut v = values(&[("queries", Some(5))]);
    registry.complete(&mut v);
    assert_eq!(v.len(), registry.len());
    assert_eq!(v["queries"], Some(5));
    assert_eq!(v["max_connections"], None);
}

#[test]
fn counter_delta_policies() {
    assert_eq!(counter_delta(Some(1000), Some(1200), Sign::Unsigned), Some(200));
    assert_eq!(counter_delta(Some(50_000), Some(12), Sign::Unsigned), Some(12));
    assert_eq!(counter_delta(Some(40), Some(25), Sign::Signed), Some(-15));
    assert_eq!(counter_delta(None, Some(25), Sign::Signed), None);
    assert_eq!(counter_delta(Some(25), None, Sign::Unsigned), None);
}

#[test]
fn diff_computes_delta_and_rounded_rate() {
    let registry = MetricRegistry::builtin();
    let prev = snapshot(1, T0, &[("queries", Some(1000))]);
    let curr = snapshot(2, T0 + MINUTE_MS, &[("queries", Some(1200))]);
    let sample = diff(&prev, &curr, &registry).unwrap();
    assert_eq!(sample.snapshot_id, 2);
    assert_eq!(sample.elapsed_seconds, 60.0);
    assert_eq!(sample.deltas["queries"], Some(200));
    assert_eq!(sample.rates["queries"], Some(3.33));
    assert_eq!(sample.values["queries"], Some(1200));
}

#[test]
fn diff_unsigned_restart_charges_new_value() {
    let registry = MetricRegistry::builtin();
    let prev = snapshot(1, T0, &[("threads_created", Some(50_000))]);
    let curr = snapshot(2, T0 + MINUTE_MS, &[("threads_created", Some(12))]);
    let sample = diff(&prev, &curr, &registry).unwrap();
    assert_eq!(sample.deltas["threads_created"], Some(12));
    assert_eq!(sample.rates["threads_created"], Some(0.2));
}

#[test]
fn diff_signed_counter_keeps_negative_delta() {
    let registry = MetricRegistry::builtin();
    let prev = snapshot(1, T0, &[("threads_connected", Some(40))]);
    let curr = snapshot(2, T0 + 10_000, &[("threads_connected", Some(25))]);
    let sample = diff(&prev, &curr, &registry).unwrap();
    assert_eq!(sample.deltas["threads_connected"], Some(-15));
    assert_eq!(sample.rates["threads_connected"], Some(-1.5));
}

#[test]
fn diff_propagates_null_and_fills_registered_columns() {
    let registry = MetricRegistry::builtin();
    let prev = snapshot(1, T0, &[("queries", None)]);
    let curr = snapshot(2, T0 + MINUTE_MS, &[("queries", Some(10))]);
    let sample = diff(&prev, &curr, &registry).unwrap();
    assert_eq!(sample.deltas["queries"], None);
    assert_eq!(sample.rates["queries"], None);
    // Registered metrics absent from both snapshots still produce (null) columns.
    assert_eq!(sample.deltas.get("innodb_row_lock_waits"), Some(&None));
    assert_eq!(sample.values.get("max_connections"), Some(&None));
}

#[test]
fn diff_gauges_carry_value_without_delta() {
    let registry = MetricRegistry::builtin();
    let prev = snapshot(1, T0, &[("max_connections", Some(151))]);
    let curr = snapshot(2, T0 + MINUTE_MS, &[("max_connections", Some(200))]);
    let sample = diff(&prev, &curr, &registry).unwrap();
    assert_eq!(sample.values["max_connections"], Some(200));
    assert!(!sample.deltas.contains_key("max_connections"));
    assert!(!sample.rates.contains_key("max_connections"));

    let columns = sample.columns();
    assert_eq!(columns["max_connections"], Some(200.0));
    assert!(!columns.contains_key("max_connections_diff"));
    assert_eq!(columns["elapsed_seconds"], Some(60.0));
}

#[test]
fn large_counters_stay_exact_in_deltas() {
    let registry = MetricRegistry::builtin();
    let base: i64 = 1 << 53;
    let prev = snapshot(1, T0, &[("queries", Some(base))]);
    let curr = snapshot(2, T0 + MINUTE_MS, &[("queries", Some(base + 1))]);
    let sample = diff(&prev, &curr, &registry).unwrap();
    assert_eq!(sample.values["queries"], Some(base + 1));
    assert_eq!(sample.deltas["queries"], Some(1));

    let columns = sample.columns();
    assert_eq!(columns["queries_diff"], Some(1.0));
    // 2^53 + 1 is not representable; the column view rounds it.
    assert_eq!(columns["queries"], Some(base as f64));
}

#[test]
fn diff_rejects_non_positive_elapsed() {
    let registry = MetricRegistry::builtin();
    let prev = snapshot(1, T0, &[("queries", Some(1))]);
    let same = snapshot(2, T0, &[("queries", Some(2))]);
    let earlier = snapshot(3, T0 - 1000, &[("queries", Some(3))]);
    assert_eq!(
        diff(&prev, &same, &registry).unwrap_err(),
        SampleError::NonPositiveElapsed {
            prev_id: 1,
            curr_id: 2,
            elapsed_ms: 0
        }
    );
    assert!(diff(&prev, &earlier, &registry).is_err());
}

#[test]
fn samples_from_skips_invalid_pairs() {
    let registry = MetricRegistry::builtin();
    let snapshots = vec![
        snapshot(1, T0, &[("queries", Some(0))]),
        snapshot(2, T0 + MINUTE_MS, &[("queries", Some(60))]),
        snapshot(3, T0 + MINUTE_MS, &[("queries", Some(90))]),
        snapshot(4, T0 + 2 * MINUTE_MS, &[("queries", Some(120))]),
    ];
    let samples = samples_from(&snapshots, &registry);
    let ids: Vec<i64> = samples.iter().map(|s| s.snapshot_id).collect();
    assert_eq!(ids, vec![2, 4]);
}

#[test]
fn parameter_changes_report_changed_gauges_only() {
    let registry = MetricRegistry::builtin();
    let prev = snapshot(
        1,
        T0,
        &[
            ("max_connections", Some(151)),
            ("innodb_buffer_pool_size", Some(128)),
            ("queries", Some(1)),
            ("sort_buffer_size", None),
        ],
    );
    let curr = snapshot(
        2,
        T0 + MINUTE_MS,
        &[
            ("max_connections", Some(500)),
            ("innodb_buffer_pool_size", Some(128)),
            ("queries", Some(99)),
            ("sort_buffer_size", Some(4)),
        ],
    );
    let changes = parameter_changes(&prev, &curr, &registry);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].name, "max_connections");
    assert_eq!(changes[0].old_value, Some(151));
    assert_eq!(changes[0].new_value, Some(500));
    assert_eq!(changes[0].created_at, T0 + MINUTE_MS);
}
