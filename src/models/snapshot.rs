// Snapshot (stored, one per collection cycle) and Sample (derived from a snapshot pair).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric name -> raw value. `None` means the server did not report it this cycle.
pub type MetricValues = BTreeMap<String, Option<i64>>;

/// One full point-in-time capture. `created_at` is epoch millis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: i64,
    pub created_at: i64,
    pub values: MetricValues,
}

/// A snapshot paired with its predecessor. `snapshot_id` is the current snapshot's id.
///
/// `values` holds the current raw value of every metric; `deltas` and `rates`
/// only carry Counter metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub snapshot_id: i64,
    pub created_at: i64,
    pub elapsed_seconds: f64,
    pub values: MetricValues,
    pub deltas: BTreeMap<String, Option<i64>>,
    pub rates: BTreeMap<String, Option<f64>>,
}

impl Sample {
    /// Flat column view used by alert expressions and envelopes:
    /// `<m>`, `<m>_diff`, `<m>_psec`, plus `elapsed_seconds`.
    ///
    /// Integer columns are exact up to 2^53; larger magnitudes round to the nearest
    /// representable f64. Stored values, deltas and rollup sums stay in i64.
    pub fn columns(&self) -> BTreeMap<String, Option<f64>> {
        let mut out = BTreeMap::new();
        out.insert("elapsed_seconds".to_string(), Some(self.elapsed_seconds));
        for (name, value) in &self.values {
            out.insert(name.clone(), value.map(|v| v as f64));
        }
        for (name, delta) in &self.deltas {
            out.insert(format!("{name}_diff"), delta.map(|v| v as f64));
        }
        for (name, rate) in &self.rates {
            out.insert(format!("{name}_psec"), *rate);
        }
        out
    }
}

/// A configuration value that changed between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterChange {
    pub created_at: i64,
    pub name: String,
    pub old_value: Option<i64>,
    pub new_value: Option<i64>,
}
