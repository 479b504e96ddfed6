// One collection cycle: fetch -> custom metrics -> store snapshot -> diff -> purge -> alerts.
// Runs start to finish for every scheduled tick; a failed fetch leaves all state untouched.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::alert::{self, Evaluation, lifecycle};
use crate::diff;
use crate::metrics::MetricRegistry;
use crate::models::Sample;
use crate::notify::Notifier;
use crate::plugin::{self, CustomMetric};
use crate::source::SnapshotSource;
use crate::store::{PurgeStats, Store};

pub const ALERT_DESCRIPTION: &str = "alert notifications";
pub const CANNOT_ACCESS_DESCRIPTION: &str = "cannot access";
pub const OK_DESCRIPTION: &str = "no alerts";

/// Per-process settings of the cycle.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub fetch_timeout: Duration,
    /// Label used in notification subjects.
    pub monitored_name: String,
    pub send_ok: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Source unreachable or timed out; nothing was stored.
    Skipped { reason: String },
    /// A snapshot for this instant already exists.
    Duplicate { created_at: i64 },
    Recorded(Box<CycleReport>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleReport {
    pub snapshot_id: i64,
    /// None for the very first snapshot or when the pair was invalid.
    pub sample: Option<Sample>,
    pub invalid_sample: bool,
    pub custom_metric_failures: usize,
    pub purge: Option<PurgeStats>,
    pub evaluation: Evaluation,
    /// Alerts whose notification was delivered this cycle.
    pub notified: usize,
    pub delivery_failed: bool,
}

pub struct Collector<S, N> {
    source: S,
    notifier: N,
    store: Arc<Store>,
    registry: Arc<MetricRegistry>,
    custom_metrics: Vec<CustomMetric>,
    settings: CycleSettings,
}

impl<S: SnapshotSource, N: Notifier> Collector<S, N> {
    pub fn new(
        source: S,
        notifier: N,
        store: Arc<Store>,
        registry: Arc<MetricRegistry>,
        custom_metrics: Vec<CustomMetric>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            source,
            notifier,
            store,
            registry,
            custom_metrics,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub async fn run_cycle(&self) -> anyhow::Result<CycleOutcome> {
        self.run_cycle_at(chrono::Utc::now().timestamp_millis()).await
    }

    /// Runs one cycle stamping the snapshot with `now_ms`.
    #[instrument(skip(self), fields(operation = "run_cycle"))]
    pub async fn run_cycle_at(&self, now_ms: i64) -> anyhow::Result<CycleOutcome> {
        let fetched = tokio::time::timeout(self.settings.fetch_timeout, self.source.fetch()).await;
        let mut values = match fetched {
            Ok(Ok(values)) => values,
            Ok(Err(e)) => return Ok(self.skip(e.to_string()).await),
            Err(_) => {
                let reason = format!("fetch timed out after {:?}", self.settings.fetch_timeout);
                return Ok(self.skip(reason).await);
            }
        };

        let custom_metric_failures = plugin::collect_custom_metrics(
            &self.source,
            &self.custom_metrics,
            &mut values,
            self.settings.fetch_timeout,
        )
        .await;
        self.registry.complete(&mut values);

        let Some(snapshot) = self.store.save_snapshot(now_ms, &values).await? else {
            warn!(
                operation = "save_snapshot",
                created_at = now_ms,
                "duplicate snapshot instant rejected"
            );
            return Ok(CycleOutcome::Duplicate { created_at: now_ms });
        };

        let mut report = CycleReport {
            snapshot_id: snapshot.id,
            custom_metric_failures,
            ..Default::default()
        };

        if let Some(prev) = self.store.previous_snapshot(snapshot.id).await? {
            match diff::diff(&prev, &snapshot, &self.registry) {
                Ok(sample) => report.sample = Some(sample),
                Err(e) => {
                    warn!(error = %e, operation = "diff", "invalid sample discarded");
                    report.invalid_sample = true;
                }
            }
        }

        match self.store.purge_expired(now_ms).await {
            Ok(stats) => {
                if stats.snapshots > 0 || stats.occurrences > 0 {
                    debug!(
                        operation = "purge_expired",
                        snapshots = stats.snapshots,
                        occurrences = stats.occurrences,
                        "expired rows purged"
                    );
                }
                report.purge = Some(stats);
            }
            Err(e) => warn!(error = %e, operation = "purge_expired", "purge failed"),
        }

        if let Some(sample) = report.sample.clone() {
            self.process_alerts(&sample, now_ms, &mut report).await?;
        }

        Ok(CycleOutcome::Recorded(Box::new(report)))
    }

    async fn skip(&self, reason: String) -> CycleOutcome {
        warn!(error = %reason, operation = "fetch_snapshot", "cycle skipped");
        let subject = format!("{}: cannot access database", self.settings.monitored_name);
        if let Err(e) = self
            .notifier
            .notify(CANNOT_ACCESS_DESCRIPTION, &subject, std::slice::from_ref(&reason))
            .await
        {
            warn!(error = %e, operation = "notify", "cannot-access notification failed");
        }
        CycleOutcome::Skipped { reason }
    }

    /// Evaluates conditions against `sample` and drives the pending alert lifecycle.
    async fn process_alerts(
        &self,
        sample: &Sample,
        now_ms: i64,
        report: &mut CycleReport,
    ) -> anyhow::Result<()> {
        let finished: Vec<i64> = self
            .store
            .pending_alerts()
            .await?
            .iter()
            .filter(|p| p.is_finished())
            .map(|p| p.condition_id)
            .collect();
        if !finished.is_empty() {
            self.store.delete_pending(&finished).await?;
        }

        let conditions = self.store.conditions().await?;
        report.evaluation = alert::evaluate(&conditions, &sample.columns());
        for &condition_id in &report.evaluation.firing {
            self.store
                .record_occurrence(condition_id, sample.snapshot_id, sample.created_at)
                .await?;
            self.store
                .upsert_pending(condition_id, sample.snapshot_id, sample.created_at)
                .await?;
        }
        self.store.mark_resolved(sample.snapshot_id).await?;

        let pending = self.store.pending_alerts().await?;
        let batch = lifecycle::select_batch(&pending);
        if batch.is_empty() {
            if self.settings.send_ok && pending.is_empty() {
                let subject = format!("{}: OK", self.settings.monitored_name);
                if let Err(e) = self.notifier.notify(OK_DESCRIPTION, &subject, &[]).await {
                    warn!(error = %e, operation = "notify", "ok notification failed");
                }
            }
            return Ok(());
        }

        let messages = lifecycle::format_messages(&batch);
        let subject = format!("{}: alert notification", self.settings.monitored_name);
        match self.notifier.notify(ALERT_DESCRIPTION, &subject, &messages).await {
            Ok(()) => {
                self.store.mark_delivered(&batch, now_ms).await?;
                report.notified = batch.len();
                info!(
                    operation = "notify",
                    alerts = batch.len(),
                    "alert notification sent"
                );
            }
            Err(e) => {
                warn!(
                    error = %e,
                    operation = "notify",
                    alerts = batch.len(),
                    "alert notification failed; retrying next cycle"
                );
                report.delivery_failed = true;
            }
        }
        Ok(())
    }
}
