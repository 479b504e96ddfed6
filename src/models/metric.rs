// Metric definitions: name + gauge/counter kind + signed/unsigned diff policy.

use serde::{Deserialize, Serialize};

/// Gauge: absolute value, carried as-is. Counter: accumulates since server start, diffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// How a decreasing counter is diffed.
/// Unsigned clamps to the current value (server restart); Signed keeps the negative delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub name: String,
    pub kind: MetricKind,
    pub sign: Sign,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, kind: MetricKind, sign: Sign) -> Self {
        Self {
            name: name.into(),
            kind,
            sign,
        }
    }

    pub fn is_counter(&self) -> bool {
        self.kind == MetricKind::Counter
    }
}
