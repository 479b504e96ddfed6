// Report query surface: samples or hour/day rollups over a recency bound, with their
// min/max envelope. Everything is recomputed from stored snapshots on read.

use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::config::ReportConfig;
use crate::diff;
use crate::metrics::MetricRegistry;
use crate::models::{MinMaxEnvelope, ParameterChange, RollupWindow, Sample, WindowClass};
use crate::rollup;
use crate::store::{DAY_MS, Store};

const HOUR_MS: i64 = 3_600_000;
const SAMPLE_START_ROUNDING_MS: i64 = 10 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportSeries {
    Samples(Vec<Sample>),
    Windows(Vec<RollupWindow>),
}

impl ReportSeries {
    pub fn len(&self) -> usize {
        match self {
            ReportSeries::Samples(s) => s.len(),
            ReportSeries::Windows(w) => w.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub window: WindowClass,
    /// Inclusive lower bound (epoch millis); None when the store is empty.
    pub from: Option<i64>,
    /// Timestamp of the latest snapshot at query start.
    pub to: Option<i64>,
    pub series: ReportSeries,
    pub envelope: MinMaxEnvelope,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterChangeLog {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub changes: Vec<ParameterChange>,
}

pub struct Reporter {
    store: Arc<Store>,
    registry: Arc<MetricRegistry>,
    config: ReportConfig,
}

impl Reporter {
    pub fn new(store: Arc<Store>, registry: Arc<MetricRegistry>, config: ReportConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Lower bound for a window class relative to the latest snapshot.
    /// `hours` overrides the configured default recency.
    pub fn range_start(&self, window: WindowClass, latest: i64, hours: Option<u32>) -> i64 {
        if let Some(h) = hours {
            return latest - i64::from(h) * HOUR_MS;
        }
        match window {
            WindowClass::Sample => {
                let start = latest - i64::from(self.config.sample_recent_hours) * HOUR_MS;
                rollup::window_start(start, SAMPLE_START_ROUNDING_MS)
            }
            WindowClass::Hour => rollup::window_start(
                latest - i64::from(self.config.hour_recent_days) * DAY_MS,
                HOUR_MS,
            ),
            WindowClass::Day => rollup::window_start(
                latest - i64::from(self.config.day_recent_days) * DAY_MS,
                DAY_MS,
            ),
        }
    }

    /// Valid samples with created_at >= range start. The read boundary (latest snapshot id)
    /// is captured once so concurrent appends do not leak into the result.
    async fn samples(
        &self,
        window: WindowClass,
        hours: Option<u32>,
    ) -> anyhow::Result<Option<(i64, i64, Vec<Sample>)>> {
        let Some(max_id) = self.store.latest_snapshot_id().await? else {
            return Ok(None);
        };
        let Some(latest) = self.store.snapshot(max_id).await? else {
            return Ok(None);
        };
        let from = self.range_start(window, latest.created_at, hours);
        let snapshots = self.store.snapshots_since(from, max_id).await?;
        let samples = diff::samples_from(&snapshots, &self.registry)
            .into_iter()
            .filter(|s| s.created_at >= from)
            .collect();
        Ok(Some((from, latest.created_at, samples)))
    }

    #[instrument(skip(self), fields(operation = "report"))]
    pub async fn report(&self, window: WindowClass, hours: Option<u32>) -> anyhow::Result<Report> {
        let Some((from, to, samples)) = self.samples(window, hours).await? else {
            return Ok(Report {
                window,
                from: None,
                to: None,
                series: empty_series(window),
                envelope: MinMaxEnvelope::new(),
            });
        };

        let (series, envelope) = match window.window_ms() {
            None => {
                let envelope = rollup::envelope(samples.iter().map(Sample::columns));
                (ReportSeries::Samples(samples), envelope)
            }
            Some(window_ms) => {
                let windows = rollup::rollup(&samples, window_ms, self.config.gauge_rollup);
                let envelope = rollup::envelope(windows.iter().map(RollupWindow::columns));
                (ReportSeries::Windows(windows), envelope)
            }
        };

        Ok(Report {
            window,
            from: Some(from),
            to: Some(to),
            series,
            envelope,
        })
    }

    /// Configuration values that changed between consecutive snapshots, ordered by time then name.
    #[instrument(skip(self), fields(operation = "parameter_changes"))]
    pub async fn parameter_changes(&self, hours: Option<u32>) -> anyhow::Result<ParameterChangeLog> {
        let Some(max_id) = self.store.latest_snapshot_id().await? else {
            return Ok(ParameterChangeLog {
                from: None,
                to: None,
                changes: Vec::new(),
            });
        };
        let Some(latest) = self.store.snapshot(max_id).await? else {
            return Ok(ParameterChangeLog {
                from: None,
                to: None,
                changes: Vec::new(),
            });
        };
        let from = self.range_start(WindowClass::Hour, latest.created_at, hours);
        let snapshots = self.store.snapshots_since(from, max_id).await?;
        let changes = snapshots
            .windows(2)
            .filter(|pair| pair[1].created_at >= from)
            .flat_map(|pair| diff::parameter_changes(&pair[0], &pair[1], &self.registry))
            .collect();
        Ok(ParameterChangeLog {
            from: Some(from),
            to: Some(latest.created_at),
            changes,
        })
    }
}

fn empty_series(window: WindowClass) -> ReportSeries {
    match window {
        WindowClass::Sample => ReportSeries::Samples(Vec::new()),
        WindowClass::Hour | WindowClass::Day => ReportSeries::Windows(Vec::new()),
    }
}
