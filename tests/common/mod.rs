// Shared test helpers: in-memory source, recording notifier, temp store.
#![allow(dead_code)]

use dbcheckpoint::cycle::{Collector, CycleSettings};
use dbcheckpoint::metrics::MetricRegistry;
use dbcheckpoint::models::{AlertCondition, MetricValues, Severity, Snapshot};
use dbcheckpoint::notify::Notifier;
use dbcheckpoint::plugin::CustomMetric;
use dbcheckpoint::source::{QueryRows, SnapshotSource};
use dbcheckpoint::store::Store;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// 2024-01-01T00:00:00Z
pub const T0: i64 = 1_704_067_200_000;

pub fn values(pairs: &[(&str, Option<i64>)]) -> MetricValues {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub fn snapshot(id: i64, created_at: i64, pairs: &[(&str, Option<i64>)]) -> Snapshot {
    Snapshot {
        id,
        created_at,
        values: values(pairs),
    }
}

pub fn condition(id: i64, expression: &str, delay_minutes: u32, repeat: bool) -> AlertCondition {
    AlertCondition {
        id,
        enabled: true,
        expression: expression.into(),
        description: format!("condition {id}"),
        severity: Severity::Error,
        delay_minutes,
        repeat,
    }
}

/// Snapshot source backed by shared state; clones see the same values.
#[derive(Clone, Default)]
pub struct FakeSource {
    values: Arc<Mutex<MetricValues>>,
    queries: Arc<Mutex<BTreeMap<String, Result<QueryRows, String>>>>,
    hanging: Arc<Mutex<BTreeSet<String>>>,
    fail: Arc<AtomicBool>,
}

impl FakeSource {
    pub fn set(&self, name: &str, value: Option<i64>) {
        self.values.lock().unwrap().insert(name.to_string(), value);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_query(&self, expression: &str, result: Result<QueryRows, String>) {
        self.queries
            .lock()
            .unwrap()
            .insert(expression.to_string(), result);
    }

    /// The query never returns until `hanging` is cleared.
    pub fn set_query_hanging(&self, expression: &str, hanging: bool) {
        let mut set = self.hanging.lock().unwrap();
        if hanging {
            set.insert(expression.to_string());
        } else {
            set.remove(expression);
        }
    }
}

impl SnapshotSource for FakeSource {
    async fn fetch(&self) -> anyhow::Result<MetricValues> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(self.values.lock().unwrap().clone())
    }

    async fn run_query(&self, expression: &str) -> anyhow::Result<QueryRows> {
        let hangs = self.hanging.lock().unwrap().contains(expression);
        if hangs {
            std::future::pending::<()>().await;
        }
        let result = self.queries.lock().unwrap().get(expression).cloned();
        match result {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => anyhow::bail!("unknown query '{}'", expression),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub description: String,
    pub subject: String,
    pub messages: Vec<String>,
}

/// Notifier that records every batch; can be switched to fail delivery.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Sent>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, description: &str, subject: &str, messages: &[String]) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("smtp unavailable");
        }
        self.sent.lock().unwrap().push(Sent {
            description: description.to_string(),
            subject: subject.to_string(),
            messages: messages.to_vec(),
        });
        Ok(())
    }
}

pub async fn temp_store(retention_days: u32) -> (TempDir, Arc<Store>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.db");
    let store = Store::connect(path.to_str().unwrap(), retention_days, 2)
        .await
        .unwrap();
    store.init().await.unwrap();
    (dir, Arc::new(store))
}

pub fn settings() -> CycleSettings {
    settings_with_timeout(Duration::from_secs(5))
}

pub fn settings_with_timeout(fetch_timeout: Duration) -> CycleSettings {
    CycleSettings {
        fetch_timeout,
        monitored_name: "db1".into(),
        send_ok: false,
    }
}

pub fn collector(
    store: Arc<Store>,
    source: FakeSource,
    notifier: RecordingNotifier,
    custom: Vec<CustomMetric>,
) -> Collector<FakeSource, RecordingNotifier> {
    let registry = Arc::new(MetricRegistry::with_custom_metrics(&custom));
    Collector::new(source, notifier, store, registry, custom, settings())
}
