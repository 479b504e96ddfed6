// Rollup windows (hour/day) and the min/max envelope served with every report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Granularity of a report series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowClass {
    Sample,
    Hour,
    Day,
}

impl WindowClass {
    /// Window length in millis; `None` for raw samples.
    pub fn window_ms(self) -> Option<i64> {
        match self {
            WindowClass::Sample => None,
            WindowClass::Hour => Some(3_600_000),
            WindowClass::Day => Some(86_400_000),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WindowClass::Sample => "sample",
            WindowClass::Hour => "hour",
            WindowClass::Day => "day",
        }
    }
}

impl FromStr for WindowClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sample" => Ok(WindowClass::Sample),
            "hour" => Ok(WindowClass::Hour),
            "day" => Ok(WindowClass::Day),
            other => anyhow::bail!("unknown window class '{}'", other),
        }
    }
}

/// How gauges are carried into a rollup window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GaugeRollup {
    /// Last non-null observation in the window.
    #[default]
    Last,
    /// Max observed value in the window.
    Max,
}

/// One hour or day bucket of samples. `window_start`/`window_end` are epoch millis, end exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupWindow {
    pub window_start: i64,
    pub window_end: i64,
    pub sample_count: usize,
    pub elapsed_seconds: f64,
    pub summed_deltas: BTreeMap<String, Option<i64>>,
    pub averaged_rates: BTreeMap<String, Option<f64>>,
    pub carried_gauges: BTreeMap<String, Option<i64>>,
}

impl RollupWindow {
    /// Same column naming and f64 precision as `Sample::columns`: `<gauge>`, `<counter>_diff`, `<counter>_psec`.
    pub fn columns(&self) -> BTreeMap<String, Option<f64>> {
        let mut out = BTreeMap::new();
        out.insert("elapsed_seconds".to_string(), Some(self.elapsed_seconds));
        for (name, value) in &self.carried_gauges {
            out.insert(name.clone(), value.map(|v| v as f64));
        }
        for (name, delta) in &self.summed_deltas {
            out.insert(format!("{name}_diff"), delta.map(|v| v as f64));
        }
        for (name, rate) in &self.averaged_rates {
            out.insert(format!("{name}_psec"), *rate);
        }
        out
    }
}

/// Min/max of one column over the retained series. Both `None` when every row was null.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Envelope {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub type MinMaxEnvelope = BTreeMap<String, Envelope>;
