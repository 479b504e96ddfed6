// Alert conditions (user-authored), occurrences (audit trail) and pending alerts (lifecycle state).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    #[default]
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => anyhow::bail!("unknown severity '{}'", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCondition {
    pub id: i64,
    pub enabled: bool,
    pub expression: String,
    pub description: String,
    pub severity: Severity,
    pub delay_minutes: u32,
    pub repeat: bool,
}

/// One row per cycle where a condition evaluated true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertOccurrence {
    pub condition_id: i64,
    pub sample_id: i64,
    pub fired_at: i64,
}

/// Live instance of a condition, joined with the condition fields needed for notification.
/// Timestamps are epoch millis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAlert {
    pub condition_id: i64,
    pub first_sample_id: i64,
    pub last_sample_id: i64,
    pub first_fired_at: i64,
    pub last_fired_at: i64,
    pub notified_at: Option<i64>,
    pub resolved: bool,
    pub resolution_notified_at: Option<i64>,
    pub description: String,
    pub severity: Severity,
    pub delay_minutes: u32,
    pub repeat: bool,
}
