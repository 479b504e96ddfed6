// Report query surface: sample/hour/day series, envelopes, recency bounds, parameter changes

mod common;

use common::*;
use dbcheckpoint::config::ReportConfig;
use dbcheckpoint::metrics::MetricRegistry;
use dbcheckpoint::models::WindowClass;
use dbcheckpoint::report::{ReportSeries, Reporter};
use dbcheckpoint::store::Store;
use std::sync::Arc;
use tempfile::TempDir;

/// 19 snapshots, 10 minutes apart, starting at T0; queries grow by 600 per step
/// and max_connections changes once at T0 + 1h.
async fn seeded() -> (TempDir, Arc<Store>, Reporter) {
    let (dir, store) = temp_store(30).await;
    for i in 0..=18 {
        let max_connections = if i < 6 { 151 } else { 500 };
        store
            .save_snapshot(
                T0 + i * 10 * MINUTE_MS,
                &values(&[
                    ("queries", Some(1_000 + i * 600)),
                    ("max_connections", Some(max_connections)),
                ]),
            )
            .await
            .unwrap();
    }
    let reporter = Reporter::new(
        store.clone(),
        Arc::new(MetricRegistry::builtin()),
        ReportConfig::default(),
    );
    (dir, store, reporter)
}

#[tokio::test]
async fn empty_store_yields_empty_report() {
    let (_dir, store) = temp_store(7).await;
    let reporter = Reporter::new(store, Arc::new(MetricRegistry::builtin()), ReportConfig::default());
    let report = reporter.report(WindowClass::Hour, None).await.unwrap();
    assert_eq!(report.from, None);
    assert_eq!(report.to, None);
    assert!(report.series.is_empty());
    assert!(report.envelope.is_empty());

    let log = reporter.parameter_changes(None).await.unwrap();
    assert!(log.changes.is_empty());
}

#[tokio::test]
async fn sample_report_covers_default_recency() {
    let (_dir, _store, reporter) = seeded().await;
    let report = reporter.report(WindowClass::Sample, None).await.unwrap();
    assert_eq!(report.to, Some(T0 + 180 * MINUTE_MS));
    let ReportSeries::Samples(samples) = &report.series else {
        panic!("expected samples");
    };
    assert_eq!(samples.len(), 18);
    assert!(samples.iter().all(|s| s.deltas["queries"] == Some(600)));
    assert!(samples.iter().all(|s| s.rates["queries"] == Some(1.0)));

    let env = &report.envelope["queries_diff"];
    assert_eq!((env.min, env.max), (Some(600.0), Some(600.0)));
    let env = &report.envelope["max_connections"];
    assert_eq!((env.min, env.max), (Some(151.0), Some(500.0)));
}

#[tokio::test]
async fn hours_parameter_narrows_the_range() {
    let (_dir, _store, reporter) = seeded().await;
    let report = reporter.report(WindowClass::Sample, Some(1)).await.unwrap();
    assert_eq!(report.from, Some(T0 + 120 * MINUTE_MS));
    assert_eq!(report.series.len(), 7);
}

#[tokio::test]
async fn hour_report_rolls_up_per_hour() {
    let (_dir, _store, reporter) = seeded().await;
    let report = reporter.report(WindowClass::Hour, None).await.unwrap();
    let ReportSeries::Windows(windows) = &report.series else {
        panic!("expected windows");
    };
    let counts: Vec<usize> = windows.iter().map(|w| w.sample_count).collect();
    assert_eq!(counts, vec![5, 6, 6, 1]);
    assert_eq!(windows[1].window_start, T0 + HOUR_MS);
    assert_eq!(windows[1].summed_deltas["queries"], Some(3_600));
    assert_eq!(windows[1].averaged_rates["queries"], Some(1.0));
    assert_eq!(windows[0].carried_gauges["max_connections"], Some(151));
    assert_eq!(windows[1].carried_gauges["max_connections"], Some(500));

    let env = &report.envelope["queries_diff"];
    assert_eq!((env.min, env.max), (Some(600.0), Some(3_600.0)));
}

#[tokio::test]
async fn day_report_has_one_window() {
    let (_dir, _store, reporter) = seeded().await;
    let report = reporter.report(WindowClass::Day, None).await.unwrap();
    assert_eq!(report.series.len(), 1);
    let ReportSeries::Windows(windows) = &report.series else {
        panic!("expected windows");
    };
    assert_eq!(windows[0].window_start, T0);
    assert_eq!(windows[0].summed_deltas["queries"], Some(18 * 600));
}

#[tokio::test]
async fn default_ranges_are_rounded() {
    let (_dir, _store, reporter) = seeded().await;
    let latest = T0 + 3 * HOUR_MS + 7 * MINUTE_MS;
    assert_eq!(
        reporter.range_start(WindowClass::Sample, latest, None),
        latest - 24 * HOUR_MS - 7 * MINUTE_MS
    );
    assert_eq!(
        reporter.range_start(WindowClass::Hour, latest, None),
        T0 - 10 * DAY_MS + 3 * HOUR_MS
    );
    assert_eq!(
        reporter.range_start(WindowClass::Day, latest, None),
        T0 - 365 * DAY_MS
    );
    assert_eq!(
        reporter.range_start(WindowClass::Day, latest, Some(2)),
        latest - 2 * HOUR_MS
    );
}

#[tokio::test]
async fn parameter_changes_lists_changed_configuration() {
    let (_dir, _store, reporter) = seeded().await;
    let log = reporter.parameter_changes(None).await.unwrap();
    assert_eq!(log.changes.len(), 1);
    let change = &log.changes[0];
    assert_eq!(change.name, "max_connections");
    assert_eq!(change.created_at, T0 + HOUR_MS);
    assert_eq!((change.old_value, change.new_value), (Some(151), Some(500)));

    let recent = reporter.parameter_changes(Some(1)).await.unwrap();
    assert!(recent.changes.is_empty());
}

#[tokio::test]
async fn backwards_clock_pairs_like_the_collection_cycle() {
    let (_dir, store) = temp_store(30).await;
    // Clock stepped back between the first and second capture.
    for (ts, queries) in [
        (T0 + 10 * MINUTE_MS, 1_000),
        (T0 + 5 * MINUTE_MS, 1_100),
        (T0 + 20 * MINUTE_MS, 1_300),
    ] {
        store
            .save_snapshot(ts, &values(&[("queries", Some(queries))]))
            .await
            .unwrap();
    }
    let reporter = Reporter::new(
        store.clone(),
        Arc::new(MetricRegistry::builtin()),
        ReportConfig::default(),
    );

    let report = reporter.report(WindowClass::Sample, None).await.unwrap();
    let ReportSeries::Samples(samples) = &report.series else {
        panic!("expected samples");
    };
    // (1, 2) is invalid and dropped; (2, 3) is the only sample, as in the live cycle.
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].snapshot_id, 3);
    assert_eq!(samples[0].deltas["queries"], Some(200));

    let live_prev = store.previous_snapshot(3).await.unwrap().unwrap();
    assert_eq!(live_prev.id, 2);

    let hourly = reporter.report(WindowClass::Hour, None).await.unwrap();
    let ReportSeries::Windows(windows) = &hourly.series else {
        panic!("expected windows");
    };
    assert_eq!(windows[0].summed_deltas["queries"], Some(200));
}
