// Collection worker: runs one cycle per scheduled tick (fixed interval or cron), publishes each
// new sample to /ws/samples subscribers, and logs cycle stats periodically.

use crate::cycle::{Collector, CycleOutcome};
use crate::maintenance_worker::until_next;
use crate::models::Sample;
use crate::notify::Notifier;
use crate::source::SnapshotSource;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant, Interval, interval};
use tracing::Instrument;

/// Rate limit for "no receivers" log (avoid logging every cycle when no one is on /ws/samples)
const NO_RECEIVERS_WARN_INTERVAL: Duration = Duration::from_secs(3600);

/// Running totals since process start.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub cycles_completed: AtomicU64,
    pub cycles_skipped: AtomicU64,
    pub duplicate_snapshots: AtomicU64,
    pub invalid_samples: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub cycle_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatsSnapshot {
    pub cycles_completed: u64,
    pub cycles_skipped: u64,
    pub duplicate_snapshots: u64,
    pub invalid_samples: u64,
    pub notifications_sent: u64,
    pub cycle_errors: u64,
}

impl WorkerStats {
    pub fn record(&self, outcome: &anyhow::Result<CycleOutcome>) {
        match outcome {
            Ok(CycleOutcome::Recorded(report)) => {
                self.cycles_completed.fetch_add(1, Ordering::Relaxed);
                if report.invalid_sample {
                    self.invalid_samples.fetch_add(1, Ordering::Relaxed);
                }
                self.notifications_sent
                    .fetch_add(report.notified as u64, Ordering::Relaxed);
            }
            Ok(CycleOutcome::Skipped { .. }) => {
                self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
            }
            Ok(CycleOutcome::Duplicate { .. }) => {
                self.duplicate_snapshots.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.cycle_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            duplicate_snapshots: self.duplicate_snapshots.load(Ordering::Relaxed),
            invalid_samples: self.invalid_samples.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            cycle_errors: self.cycle_errors.load(Ordering::Relaxed),
        }
    }
}

/// Collector, channels, and shutdown for the worker.
pub struct WorkerDeps<S, N> {
    pub collector: Arc<Collector<S, N>>,
    pub tx: broadcast::Sender<Sample>,
    pub ws_sample_connections: Arc<AtomicUsize>,
    pub stats: Arc<WorkerStats>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Worker timing and logging config.
pub struct WorkerConfig {
    pub interval_secs: u64,
    /// Cron expression (local time); when set, replaces the fixed interval.
    pub schedule: Option<String>,
    /// How often to log cycle stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// Resolves when the next cycle is due.
async fn next_run(schedule: Option<&cron::Schedule>, tick: &mut Interval) {
    match schedule {
        None => {
            tick.tick().await;
        }
        Some(schedule) => match until_next(schedule) {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        },
    }
}

pub fn spawn<S, N>(deps: WorkerDeps<S, N>, config: WorkerConfig) -> tokio::task::JoinHandle<()>
where
    S: SnapshotSource + 'static,
    N: Notifier + 'static,
{
    let WorkerDeps {
        collector,
        tx,
        ws_sample_connections,
        stats,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        interval_secs,
        schedule,
        stats_log_interval_secs,
    } = config;

    let schedule = schedule.and_then(|s| match cron::Schedule::from_str(&s) {
        Ok(schedule) => Some(schedule),
        Err(e) => {
            tracing::warn!(error = %e, cron = %s, "invalid collection schedule; using interval");
            None
        }
    });
    let stats_log_interval = Duration::from_secs(stats_log_interval_secs);

    let worker_span = tracing::span!(tracing::Level::DEBUG, "worker", interval_secs);

    let task = async move {
        let mut tick = interval(Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut last_no_receivers_warn: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = next_run(schedule.as_ref(), &mut tick) => {
                    let outcome = collector.run_cycle().await;
                    stats.record(&outcome);
                    match outcome {
                        Ok(CycleOutcome::Recorded(report)) => {
                            tracing::debug!(
                                operation = "run_cycle",
                                snapshot_id = report.snapshot_id,
                                firing = report.evaluation.firing.len(),
                                notified = report.notified,
                                "cycle complete"
                            );
                            if let Some(sample) = report.sample
                                && tx.send(sample).is_err()
                            {
                                let should_warn = last_no_receivers_warn
                                    .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_WARN_INTERVAL);
                                if should_warn {
                                    tracing::debug!(
                                        operation = "broadcast_sample",
                                        "No active WebSocket clients; broadcast channel has no receivers"
                                    );
                                    last_no_receivers_warn = Some(Instant::now());
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                operation = "run_cycle",
                                "collection cycle failed"
                            );
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    let s = stats.snapshot();
                    tracing::info!(
                        ws_sample_clients = ws_sample_connections.load(Ordering::Relaxed),
                        cycles_completed = s.cycles_completed,
                        cycles_skipped = s.cycles_skipped,
                        duplicate_snapshots = s.duplicate_snapshots,
                        invalid_samples = s.invalid_samples,
                        notifications_sent = s.notifications_sent,
                        cycle_errors = s.cycle_errors,
                        "app stats"
                    );
                }
            }
        }
    };
    tokio::spawn(task.instrument(worker_span))
}
