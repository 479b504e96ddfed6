// Custom metrics: user expressions evaluated against the monitored server once per cycle,
// merged into the snapshot as ordinary `custom_<id>` / `custom_<id>_time` metrics.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

use crate::models::MetricValues;
use crate::source::{QueryRows, SnapshotSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomMetricKind {
    Value,
    ValuePerSecond,
    ElapsedTime,
}

impl CustomMetricKind {
    pub fn records_elapsed_time(self) -> bool {
        matches!(self, CustomMetricKind::Value | CustomMetricKind::ElapsedTime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMetric {
    pub id: i64,
    #[serde(default)]
    pub description: String,
    pub expression: String,
    pub kind: CustomMetricKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PluginError {
    #[error("custom metric {id}: query failed: {reason}")]
    Query { id: i64, reason: String },
    #[error("custom metric {id}: expected exactly one row, got {rows}")]
    RowCount { id: i64, rows: usize },
    #[error("custom metric {id}: expected exactly one column, got {columns}")]
    ColumnCount { id: i64, columns: usize },
    #[error("custom metric {id}: value '{value}' is not an integer")]
    NotInteger { id: i64, value: String },
    #[error("custom metric {id}: query timed out after {timeout:?}")]
    Timeout { id: i64, timeout: Duration },
}

pub fn value_metric_name(id: i64) -> String {
    format!("custom_{id}")
}

pub fn time_metric_name(id: i64) -> String {
    format!("custom_{id}_time")
}

/// `custom_7` -> (7, false); `custom_7_time` -> (7, true).
pub fn parse_metric_name(name: &str) -> Option<(i64, bool)> {
    let rest = name.strip_prefix("custom_")?;
    match rest.strip_suffix("_time") {
        Some(id) => id.parse().ok().map(|id| (id, true)),
        None => rest.parse().ok().map(|id| (id, false)),
    }
}

/// The single scalar of a one-row, one-column result. NULL is a valid value.
pub fn scalar_from_rows(id: i64, rows: &QueryRows) -> Result<Option<i64>, PluginError> {
    let [row] = rows.as_slice() else {
        return Err(PluginError::RowCount {
            id,
            rows: rows.len(),
        });
    };
    let [cell] = row.as_slice() else {
        return Err(PluginError::ColumnCount {
            id,
            columns: row.len(),
        });
    };
    match cell {
        None => Ok(None),
        Some(text) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| PluginError::NotInteger {
                id,
                value: text.clone(),
            }),
    }
}

/// Runs every enabled custom metric and merges results into `values`.
/// Each query is bounded by `timeout`. A failing metric is reported and left null;
/// returns the number of failures.
pub async fn collect_custom_metrics<S: SnapshotSource>(
    source: &S,
    metrics: &[CustomMetric],
    values: &mut MetricValues,
    timeout: Duration,
) -> usize {
    let mut failures = 0;
    for metric in metrics.iter().filter(|m| m.enabled) {
        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, source.run_query(&metric.expression)).await
        {
            Ok(Ok(rows)) => scalar_from_rows(metric.id, &rows),
            Ok(Err(e)) => Err(PluginError::Query {
                id: metric.id,
                reason: e.to_string(),
            }),
            Err(_) => Err(PluginError::Timeout {
                id: metric.id,
                timeout,
            }),
        };
        let elapsed_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(value) => {
                values.insert(value_metric_name(metric.id), value);
                if metric.kind.records_elapsed_time() {
                    values.insert(time_metric_name(metric.id), Some(elapsed_ms));
                }
            }
            Err(e) => {
                failures += 1;
                warn!(
                    error = %e,
                    operation = "collect_custom_metric",
                    custom_metric_id = metric.id,
                    "custom metric skipped this cycle"
                );
                values.insert(value_metric_name(metric.id), None);
                if metric.kind.records_elapsed_time() {
                    values.insert(time_metric_name(metric.id), None);
                }
            }
        }
    }
    failures
}
