use serde::Deserialize;
use std::str::FromStr;

use crate::models::{AlertCondition, GaugeRollup, Severity};
use crate::plugin::CustomMetric;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default, rename = "custom_metric")]
    pub custom_metrics: Vec<CustomMetric>,
    #[serde(default, rename = "alert_condition")]
    pub alert_conditions: Vec<AlertConditionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    /// Purge horizon. No default: the pipeline refuses to run without one.
    pub retention_days: Option<u32>,
    /// Cron expression (local time) for VACUUM; takes precedence over `vacuum_interval_secs`.
    pub vacuum_schedule: Option<String>,
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
}

fn default_max_pool_size() -> u32 {
    4
}

fn default_vacuum_interval_secs() -> u64 {
    86_400
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Cron expression (local time); takes precedence over `interval_secs`.
    pub schedule: Option<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Max number of samples kept in the broadcast channel for /ws/samples (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// How often to log cycle stats at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
    /// Label used in notification subjects.
    #[serde(default = "default_monitored_name")]
    pub monitored_name: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            schedule: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            broadcast_capacity: default_broadcast_capacity(),
            stats_log_interval_secs: default_stats_log_interval_secs(),
            monitored_name: default_monitored_name(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_broadcast_capacity() -> usize {
    16
}

fn default_stats_log_interval_secs() -> u64 {
    3600
}

fn default_monitored_name() -> String {
    "database".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_status_query")]
    pub status_query: String,
    #[serde(default = "default_variables_query")]
    pub variables_query: String,
}

fn default_status_query() -> String {
    "SHOW GLOBAL STATUS".into()
}

fn default_variables_query() -> String {
    "SHOW GLOBAL VARIABLES".into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    #[default]
    Log,
    Command,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub kind: NotifyKind,
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
    /// Send an "all clear" notification on cycles with nothing to report.
    #[serde(default)]
    pub send_ok: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            kind: NotifyKind::Log,
            command: None,
            args: Vec::new(),
            timeout_secs: default_notify_timeout_secs(),
            send_ok: false,
        }
    }
}

fn default_notify_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub gauge_rollup: GaugeRollup,
    #[serde(default = "default_sample_recent_hours")]
    pub sample_recent_hours: u32,
    #[serde(default = "default_hour_recent_days")]
    pub hour_recent_days: u32,
    #[serde(default = "default_day_recent_days")]
    pub day_recent_days: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            gauge_rollup: GaugeRollup::default(),
            sample_recent_hours: default_sample_recent_hours(),
            hour_recent_days: default_hour_recent_days(),
            day_recent_days: default_day_recent_days(),
        }
    }
}

fn default_sample_recent_hours() -> u32 {
    24
}

fn default_hour_recent_days() -> u32 {
    10
}

fn default_day_recent_days() -> u32 {
    365
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConditionConfig {
    pub id: i64,
    pub expression: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub delay_minutes: u32,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl From<&AlertConditionConfig> for AlertCondition {
    fn from(c: &AlertConditionConfig) -> Self {
        AlertCondition {
            id: c.id,
            enabled: c.enabled,
            expression: c.expression.clone(),
            description: c.description.clone(),
            severity: c.severity,
            delay_minutes: c.delay_minutes,
            repeat: c.repeat,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validated purge horizon in days.
    pub fn retention_days(&self) -> anyhow::Result<u32> {
        self.database
            .retention_days
            .ok_or_else(|| anyhow::anyhow!("database.retention_days is required (purge horizon in days)"))
    }

    /// Configured alert conditions as stored and evaluated.
    pub fn conditions(&self) -> Vec<AlertCondition> {
        self.alert_conditions.iter().map(AlertCondition::from).collect()
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        let retention_days = self.retention_days()?;
        anyhow::ensure!(
            retention_days > 0,
            "database.retention_days must be > 0, got {}",
            retention_days
        );
        anyhow::ensure!(
            self.database.vacuum_interval_secs > 0,
            "database.vacuum_interval_secs must be > 0, got {}",
            self.database.vacuum_interval_secs
        );
        if let Some(expr) = &self.database.vacuum_schedule {
            cron::Schedule::from_str(expr)
                .map_err(|e| anyhow::anyhow!("database.vacuum_schedule is not a valid cron expression: {}", e))?;
        }
        anyhow::ensure!(
            self.collection.interval_secs > 0,
            "collection.interval_secs must be > 0, got {}",
            self.collection.interval_secs
        );
        if let Some(expr) = &self.collection.schedule {
            cron::Schedule::from_str(expr)
                .map_err(|e| anyhow::anyhow!("collection.schedule is not a valid cron expression: {}", e))?;
        }
        anyhow::ensure!(
            self.collection.fetch_timeout_secs > 0,
            "collection.fetch_timeout_secs must be > 0, got {}",
            self.collection.fetch_timeout_secs
        );
        anyhow::ensure!(
            self.collection.broadcast_capacity > 0,
            "collection.broadcast_capacity must be > 0, got {}",
            self.collection.broadcast_capacity
        );
        anyhow::ensure!(
            self.collection.stats_log_interval_secs > 0,
            "collection.stats_log_interval_secs must be > 0, got {}",
            self.collection.stats_log_interval_secs
        );
        anyhow::ensure!(
            !self.source.command.is_empty(),
            "source.command must be non-empty"
        );
        anyhow::ensure!(
            self.notify.kind != NotifyKind::Command || self.notify.command.is_some(),
            "notify.command is required when notify.kind = \"command\""
        );
        anyhow::ensure!(
            self.notify.timeout_secs > 0,
            "notify.timeout_secs must be > 0, got {}",
            self.notify.timeout_secs
        );
        anyhow::ensure!(
            self.report.sample_recent_hours > 0
                && self.report.hour_recent_days > 0
                && self.report.day_recent_days > 0,
            "report recency bounds must be > 0"
        );

        let mut metric_ids: Vec<i64> = self.custom_metrics.iter().map(|m| m.id).collect();
        metric_ids.sort_unstable();
        if let Some(w) = metric_ids.windows(2).find(|w| w[0] == w[1]) {
            anyhow::bail!("custom_metric.id {} is defined more than once", w[0]);
        }
        for m in &self.custom_metrics {
            anyhow::ensure!(m.id > 0, "custom_metric.id must be > 0, got {}", m.id);
            anyhow::ensure!(
                !m.expression.trim().is_empty(),
                "custom_metric {}: expression must be non-empty",
                m.id
            );
        }

        let mut condition_ids: Vec<i64> = self.alert_conditions.iter().map(|c| c.id).collect();
        condition_ids.sort_unstable();
        if let Some(w) = condition_ids.windows(2).find(|w| w[0] == w[1]) {
            anyhow::bail!("alert_condition.id {} is defined more than once", w[0]);
        }
        Ok(())
    }
}
